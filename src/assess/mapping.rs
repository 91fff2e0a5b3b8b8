//! Mapping-quality assessment from alignment-log counters.

use log::warn;

use crate::config::{CheckId, QcThresholds};
use crate::data::{AlignmentLogStore, SampleTable};

/// Outcome of the mapping-quality stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MappingSummary {
    /// Rows with a log.
    pub assessed: usize,
    /// Rows skipped for want of a log.
    pub missing_logs: usize,
    /// Rows that picked up at least one flag here.
    pub flagged: usize,
}

impl std::fmt::Display for MappingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mapping quality")?;
        writeln!(f, "  Assessed:     {}", self.assessed)?;
        writeln!(f, "  Missing logs: {}", self.missing_logs)?;
        writeln!(f, "  Flagged:      {}", self.flagged)?;
        Ok(())
    }
}

/// Assess read totals and unique-alignment fraction for every row.
///
/// Rows without an alignment log are skipped with a warning and keep both
/// metrics unset. A zero read total makes the alignment fraction undefined
/// (NaN) and flags the row outright.
///
/// # Arguments
/// * `table` - Sample table to annotate
/// * `logs` - Alignment logs keyed by sample id
/// * `thresholds` - QC threshold document
pub fn assess_mapping_quality(
    table: &mut SampleTable,
    logs: &AlignmentLogStore,
    thresholds: &QcThresholds,
) -> MappingSummary {
    let total_threshold = thresholds.threshold(CheckId::TotalReads);
    let align_threshold = thresholds.threshold(CheckId::AlignPct);

    let mut summary = MappingSummary::default();
    for row in table.rows_mut() {
        let log = match logs.get(&row.sample_id) {
            Ok(log) => *log,
            Err(e) => {
                warn!("{}; skipping mapping assessment for '{}'", e, row.fastq);
                summary.missing_logs += 1;
                continue;
            }
        };
        summary.assessed += 1;
        row.metrics.total_reads = Some(log.total_reads);

        let mut newly_flagged = false;
        if log.total_reads == 0 {
            // Undefined ratio counts against the sample, not as missing.
            row.metrics.align_pct = Some(f64::NAN);
            newly_flagged |= row.flag(CheckId::AlignPct);
        } else {
            let align_pct = log.unique_alignment as f64 / log.total_reads as f64;
            row.metrics.align_pct = Some(align_pct);
            if align_pct < align_threshold {
                newly_flagged |= row.flag(CheckId::AlignPct);
            }
        }
        if (log.total_reads as f64) < total_threshold {
            newly_flagged |= row.flag(CheckId::TotalReads);
        }
        if newly_flagged {
            summary.flagged += 1;
        }
    }
    summary
}
