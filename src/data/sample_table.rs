//! The per-sample metadata table that all assessors read and annotate.
//!
//! Rows come from the batch sample sheet (a comma-separated export of the
//! experiment database). Column headers are upper-cased on load, replicate
//! numbers are re-derived within each (genotype, conditions) group, and a
//! normalized sample key links each row to its expression-matrix column and
//! alignment log.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::warn;

use crate::config::{CheckId, QcThresholds};
use crate::data::expression::ExpressionMatrix;
use crate::error::{QcError, Result};

const GENOTYPE_COL: &str = "GENOTYPE";
const REPLICATE_COL: &str = "REPLICATE";
const FASTQ_COL: &str = "FASTQFILENAME";

/// Normalize a fastq filename or matrix column header into the shared
/// sample key: basename with the fastq extension (and, for matrix columns
/// produced by the counting step, a trailing `_read_count.tsv`) stripped.
pub fn normalize_sample_key(name: &str) -> String {
    let base = name.trim().rsplit('/').next().unwrap_or(name);
    let mut base = base.strip_suffix("_read_count.tsv").unwrap_or(base);
    for suffix in [".fastq.gz", ".fastq", ".fq.gz", ".fq"] {
        if let Some(stripped) = base.strip_suffix(suffix) {
            base = stripped;
            break;
        }
    }
    base.to_string()
}

/// Derived per-sample metrics, filled in by the assessors.
///
/// `None`/missing means the producing stage never ran for this row; NaN
/// means it ran and the value is undefined (degenerate input). `+inf` in
/// `mut_fow` marks a zero wildtype baseline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metrics {
    /// Total read count from the alignment log.
    pub total_reads: Option<u64>,
    /// Uniquely aligned fraction; NaN when the total was zero.
    pub align_pct: Option<f64>,
    /// Fold-over-wildtype per genotype token, in token order. NaN entries
    /// are genes that had to be skipped.
    pub mut_fow: Vec<f64>,
    /// Fold-over-median per resistance marker.
    pub marker_fom: BTreeMap<String, f64>,
    /// CoV median per scored replicate subset, keyed by subset label.
    pub cov_med: BTreeMap<String, f64>,
}

/// One sample row of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub genotype: String,
    /// Re-derived replicate number, 1-based within the (genotype,
    /// conditions) group in sheet order.
    pub replicate: u32,
    /// Condition values in configured descriptor order.
    pub conditions: Vec<String>,
    /// Fastq filename as given in the sheet.
    pub fastq: String,
    /// Normalized key, see [`normalize_sample_key`].
    pub sample_id: String,
    /// Set by the audit stage when the accumulated status crosses the
    /// audit threshold; `None` is reserved for manual review.
    pub auto_audit: Option<bool>,
    pub metrics: Metrics,
    fired: Vec<CheckId>,
}

impl SampleRow {
    fn new(genotype: String, replicate: u32, conditions: Vec<String>, fastq: String) -> Self {
        let sample_id = normalize_sample_key(&fastq);
        SampleRow {
            genotype,
            replicate,
            conditions,
            fastq,
            sample_id,
            auto_audit: None,
            metrics: Metrics::default(),
            fired: Vec::new(),
        }
    }

    /// Record that a check fired. Each check contributes at most once per
    /// row; returns whether this call newly applied it.
    pub fn flag(&mut self, check: CheckId) -> bool {
        if self.fired.contains(&check) {
            return false;
        }
        self.fired.push(check);
        true
    }

    /// Whether a check has fired on this row.
    pub fn flagged(&self, check: CheckId) -> bool {
        self.fired.contains(&check)
    }

    /// The checks that fired, in firing order.
    pub fn fired(&self) -> &[CheckId] {
        &self.fired
    }

    /// Accumulated status under the given threshold document.
    pub fn status(&self, thresholds: &QcThresholds) -> u32 {
        self.fired.iter().map(|c| thresholds.status(*c)).sum()
    }

    /// Group identity of this row.
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            genotype: self.genotype.clone(),
            conditions: self.conditions.clone(),
        }
    }

    /// Number of dot-separated perturbation tokens in the genotype.
    pub fn genotype_tokens(&self) -> usize {
        self.genotype.split('.').count()
    }
}

/// Identity of a replicate group: genotype plus condition values.
///
/// `Ord` gives the deterministic group iteration order (genotype first,
/// then conditions lexicographically).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub genotype: String,
    pub conditions: Vec<String>,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.genotype)?;
        if !self.conditions.is_empty() {
            write!(f, " ({})", self.conditions.join(", "))?;
        }
        Ok(())
    }
}

/// Replicate group index: group -> replicate number -> matrix sample key.
/// Only samples with an expression-matrix column appear.
pub type SampleGroups = BTreeMap<GroupKey, BTreeMap<u32, String>>;

/// The batch sample table, in sheet order.
#[derive(Debug, Clone)]
pub struct SampleTable {
    condition_names: Vec<String>,
    rows: Vec<SampleRow>,
}

impl SampleTable {
    /// Load a sample sheet.
    ///
    /// Headers are upper-cased before matching. `GENOTYPE`, `REPLICATE`
    /// and `FASTQFILENAME` must be present along with every configured
    /// condition descriptor; `REPLICATE` values are ignored and re-derived
    /// (the sheet's numbering is not trusted across pooled batches).
    pub fn from_csv<P: AsRef<Path>>(path: P, conditions: &[String]) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_uppercase())
            .collect();

        let col = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| QcError::MissingColumn(name.to_string()))
        };
        let genotype_idx = col(GENOTYPE_COL)?;
        col(REPLICATE_COL)?;
        let fastq_idx = col(FASTQ_COL)?;
        let condition_names: Vec<String> = conditions.iter().map(|c| c.to_uppercase()).collect();
        let condition_idx: Vec<usize> = condition_names
            .iter()
            .map(|c| col(c))
            .collect::<Result<_>>()?;

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            let genotype = record.get(genotype_idx).unwrap_or("").trim().to_string();
            let fastq = record.get(fastq_idx).unwrap_or("").trim().to_string();
            let values: Vec<String> = condition_idx
                .iter()
                .map(|&i| record.get(i).unwrap_or("").trim().to_string())
                .collect();
            records.push((genotype, fastq, values));
        }
        if records.is_empty() {
            return Err(QcError::EmptyData("no rows in sample sheet".to_string()));
        }
        Ok(Self::from_records(records, &condition_names))
    }

    /// Build a table from (genotype, fastq, condition values) records in
    /// sheet order, re-deriving replicate numbers within each group.
    pub fn from_records(
        records: Vec<(String, String, Vec<String>)>,
        condition_names: &[String],
    ) -> Self {
        let mut counters: HashMap<(String, Vec<String>), u32> = HashMap::new();
        let rows = records
            .into_iter()
            .map(|(genotype, fastq, values)| {
                let count = counters
                    .entry((genotype.clone(), values.clone()))
                    .or_insert(0);
                *count += 1;
                SampleRow::new(genotype, *count, values, fastq)
            })
            .collect();
        SampleTable {
            condition_names: condition_names.to_vec(),
            rows,
        }
    }

    /// Configured condition descriptor names (upper-cased).
    pub fn condition_names(&self) -> &[String] {
        &self.condition_names
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [SampleRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build the replicate group index against a matrix. Rows whose sample
    /// key has no matrix column are excluded (and warned about): they can
    /// carry mapping metrics but never expression-based ones.
    pub fn group_index(&self, matrix: &ExpressionMatrix) -> SampleGroups {
        let mut groups: SampleGroups = BTreeMap::new();
        for row in &self.rows {
            if matrix.sample_col(&row.sample_id).is_none() {
                warn!(
                    "sample '{}' ({}) has no expression-matrix column; excluded from replicate groups",
                    row.sample_id, row.fastq
                );
                continue;
            }
            groups
                .entry(row.group_key())
                .or_default()
                .insert(row.replicate, row.sample_id.clone());
        }
        groups
    }

    /// The row with the given group identity and replicate number.
    pub fn find_row_mut(&mut self, key: &GroupKey, replicate: u32) -> Option<&mut SampleRow> {
        self.rows.iter_mut().find(|r| {
            r.replicate == replicate && r.genotype == key.genotype && r.conditions == key.conditions
        })
    }
}

/// Check that the given key columns identify sheet rows uniquely.
///
/// Returns the offending key tuples (rendered `col=value` comma-joined)
/// with their row counts, in first-appearance order. Headers and key names
/// are upper-cased before matching.
pub fn find_duplicate_keys<P: AsRef<Path>>(
    path: P,
    keys: &[String],
) -> Result<Vec<(String, usize)>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_uppercase())
        .collect();

    let mut key_idx = Vec::with_capacity(keys.len());
    for key in keys {
        let upper = key.to_uppercase();
        let idx = headers
            .iter()
            .position(|h| *h == upper)
            .ok_or_else(|| QcError::MissingColumn(upper.clone()))?;
        key_idx.push((upper, idx));
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for record in reader.records() {
        let record = record?;
        let rendered = key_idx
            .iter()
            .map(|(name, i)| format!("{}={}", name, record.get(*i).unwrap_or("").trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let count = counts.entry(rendered.clone()).or_insert(0);
        if *count == 0 {
            order.push(rendered);
        }
        *count += 1;
    }

    Ok(order
        .into_iter()
        .filter_map(|key| {
            let n = counts[&key];
            (n > 1).then_some((key, n))
        })
        .collect())
}
