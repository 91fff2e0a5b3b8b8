//! Assembly and writing of the per-sample quality summary table.
//!
//! The column set is partly dynamic: condition descriptors, configured
//! markers and the replicate-subset labels encountered during scoring all
//! contribute columns. Assembly is deterministic, so writing the same
//! batch twice produces byte-identical files.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::QcThresholds;
use crate::data::{SampleRow, SampleTable};
use crate::error::Result;

/// Audit bookkeeping columns between the conditions and the metrics.
/// `MANUAL_AUDIT`, `USER` and `NOTE` are written blank, reserved for the
/// reviewer pass over the finished report.
const AUDIT_COLS: [&str; 5] = ["STATUS", "AUTO_AUDIT", "MANUAL_AUDIT", "USER", "NOTE"];

/// The rendered quality summary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcReport {
    header: Vec<String>,
    records: Vec<Vec<String>>,
}

impl QcReport {
    /// Assemble the report from an assessed table.
    ///
    /// Rows are sorted by (genotype, conditions, replicate). Marker
    /// columns follow the configured marker order; subset CoV columns are
    /// ordered by subset size descending, then lexicographically.
    pub fn build(table: &SampleTable, thresholds: &QcThresholds, markers: &[String]) -> Self {
        let mut cov_labels: Vec<String> = table
            .rows()
            .iter()
            .flat_map(|r| r.metrics.cov_med.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        cov_labels.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut header: Vec<String> = vec![
            "GENOTYPE".to_string(),
            "REPLICATE".to_string(),
            "FASTQFILENAME".to_string(),
        ];
        header.extend(table.condition_names().iter().cloned());
        header.extend(AUDIT_COLS.iter().map(|c| c.to_string()));
        header.push("TOTAL".to_string());
        header.push("ALIGN_PCT".to_string());
        header.push("MUT_FOW".to_string());
        header.extend(markers.iter().map(|m| format!("{}_FOM", m)));
        header.extend(cov_labels.iter().map(|l| format!("COV_MED_REP{}", l)));

        let mut rows: Vec<&SampleRow> = table.rows().iter().collect();
        rows.sort_by(|a, b| {
            a.genotype
                .cmp(&b.genotype)
                .then_with(|| a.conditions.cmp(&b.conditions))
                .then_with(|| a.replicate.cmp(&b.replicate))
        });

        let records = rows
            .into_iter()
            .map(|row| render_row(row, thresholds, markers, &cov_labels))
            .collect();

        QcReport { header, records }
    }

    #[inline]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    #[inline]
    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    /// Write the report to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "{}", self.header.join("\t"))?;
        for record in &self.records {
            writeln!(writer, "{}", record.join("\t"))?;
        }
        Ok(())
    }
}

fn render_row(
    row: &SampleRow,
    thresholds: &QcThresholds,
    markers: &[String],
    cov_labels: &[String],
) -> Vec<String> {
    let mut record = vec![
        row.genotype.clone(),
        row.replicate.to_string(),
        row.fastq.clone(),
    ];
    record.extend(row.conditions.iter().cloned());

    record.push(row.status(thresholds).to_string());
    record.push(match row.auto_audit {
        Some(true) => "1".to_string(),
        _ => String::new(),
    });
    // MANUAL_AUDIT, USER, NOTE
    record.push(String::new());
    record.push(String::new());
    record.push(String::new());

    record.push(
        row.metrics
            .total_reads
            .map(|t| t.to_string())
            .unwrap_or_default(),
    );
    record.push(row.metrics.align_pct.map(fmt_float).unwrap_or_default());
    record.push(fmt_fow(&row.metrics.mut_fow));
    for marker in markers {
        record.push(
            row.metrics
                .marker_fom
                .get(marker)
                .copied()
                .map(fmt_float)
                .unwrap_or_default(),
        );
    }
    for label in cov_labels {
        record.push(
            row.metrics
                .cov_med
                .get(label)
                .copied()
                .map(fmt_float)
                .unwrap_or_default(),
        );
    }
    record
}

/// Three-decimal rendering; undefined values are left blank.
fn fmt_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{:.3}", v)
    }
}

/// Comma-joined per-token fold-over-wildtype values. The zero-baseline
/// sentinel renders as `inf`, skipped genes as `NA`.
fn fmt_fow(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| {
            if v.is_nan() {
                "NA".to_string()
            } else if v.is_infinite() {
                "inf".to_string()
            } else {
                format!("{:.3}", v)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
