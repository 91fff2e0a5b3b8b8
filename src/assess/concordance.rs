//! Replicate-concordance assessment over subsets of each group.
//!
//! For every replicate group the per-gene coefficient of variation is
//! summarized (median across genes) for the full replicate set and for
//! every smaller subset down to pairs. The largest subset that meets the
//! concordance threshold defines the concordant core; replicates outside
//! it are flagged as outliers.

use log::warn;
use rayon::prelude::*;

use crate::config::{CheckId, QcThresholds};
use crate::data::{ExpressionMatrix, SampleGroups, SampleTable};
use crate::stats;

/// Groups bigger than this skip concordance scoring: the subset count is
/// exponential, and single-digit replicate numbers keep subset labels
/// unambiguous.
pub const MAX_SUBSET_REPS: usize = 8;

/// Outcome of the replicate-concordance stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConcordanceSummary {
    /// Groups scored across their subsets.
    pub groups_scored: usize,
    /// Single-replicate groups, exempt from scoring.
    pub groups_exempt: usize,
    /// Groups over [`MAX_SUBSET_REPS`], skipped with a warning.
    pub groups_capped: usize,
    /// Subsets scored across all groups.
    pub subsets_scored: usize,
    /// Replicates flagged as outliers.
    pub outliers: usize,
}

impl std::fmt::Display for ConcordanceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Replicate concordance")?;
        writeln!(f, "  Groups scored: {}", self.groups_scored)?;
        writeln!(f, "  Exempt (n=1):  {}", self.groups_exempt)?;
        writeln!(f, "  Over rep cap:  {}", self.groups_capped)?;
        writeln!(f, "  Subsets:       {}", self.subsets_scored)?;
        writeln!(f, "  Outliers:      {}", self.outliers)?;
        Ok(())
    }
}

fn push_combinations(items: &[u32], k: usize, start: usize, current: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
    if current.len() == k {
        out.push(current.clone());
        return;
    }
    for i in start..items.len() {
        if items.len() - i < k - current.len() {
            break;
        }
        current.push(items[i]);
        push_combinations(items, k, i + 1, current, out);
        current.pop();
    }
}

/// Enumerate replicate subsets: sizes from the full set down to pairs,
/// lexicographically ascending within each size. This order is part of the
/// selection contract (first minimum wins ties).
pub fn replicate_combinations(reps: &[u32]) -> Vec<Vec<u32>> {
    let mut sorted = reps.to_vec();
    sorted.sort_unstable();
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(sorted.len());
    for k in (2..=sorted.len()).rev() {
        push_combinations(&sorted, k, 0, &mut current, &mut out);
    }
    out
}

/// Label of a subset: its replicate numbers, ascending, concatenated.
pub fn subset_label(reps: &[u32]) -> String {
    let mut sorted = reps.to_vec();
    sorted.sort_unstable();
    sorted.iter().map(|r| r.to_string()).collect()
}

/// Median across genes of the per-gene coefficient of variation
/// (population std over mean) across the given sample columns. Genes with
/// an undefined CoV (all-zero, or touching a NaN cell) are ignored; NaN
/// when none remain.
fn cov_median(matrix: &ExpressionMatrix, cols: &[usize]) -> f64 {
    let covs: Vec<f64> = (0..matrix.n_genes())
        .into_par_iter()
        .map(|gene| {
            let values: Vec<f64> = cols.iter().map(|&c| matrix.value(gene, c)).collect();
            stats::population_std(&values) / stats::mean(&values)
        })
        .collect();
    stats::nan_median(&covs)
}

/// Score replicate subsets per group and flag discordant replicates.
///
/// Every scored subset's CoV median is recorded on every row of its group
/// under the subset label. Selection walks subset sizes from largest to
/// smallest and stops at the first size with a passing subset (CoV median
/// below threshold), picking the minimal score there; with no passing size
/// the full set stands and nothing is flagged. Single-replicate groups are
/// exempt.
///
/// # Arguments
/// * `table` - Sample table to annotate
/// * `matrix` - Normalized expression
/// * `groups` - Replicate group index over the matrix
/// * `thresholds` - QC threshold document
pub fn assess_replicate_concordance(
    table: &mut SampleTable,
    matrix: &ExpressionMatrix,
    groups: &SampleGroups,
    thresholds: &QcThresholds,
) -> ConcordanceSummary {
    let threshold = thresholds.threshold(CheckId::CovMed);

    let mut summary = ConcordanceSummary::default();
    for (key, members) in groups {
        let n = members.len();
        if n < 2 {
            summary.groups_exempt += 1;
            continue;
        }
        if n > MAX_SUBSET_REPS {
            warn!(
                "group {} has {} replicates (cap {}); skipping concordance",
                key, n, MAX_SUBSET_REPS
            );
            summary.groups_capped += 1;
            continue;
        }
        summary.groups_scored += 1;

        let reps: Vec<u32> = members.keys().copied().collect();
        let mut scored: Vec<(Vec<u32>, f64)> = Vec::new();
        for combo in replicate_combinations(&reps) {
            let cols: Vec<usize> = combo
                .iter()
                .filter_map(|r| members.get(r))
                .filter_map(|s| matrix.sample_col(s))
                .collect();
            let score = cov_median(matrix, &cols);
            scored.push((combo, score));
        }
        summary.subsets_scored += scored.len();

        for &rep in &reps {
            if let Some(row) = table.find_row_mut(key, rep) {
                for (combo, score) in &scored {
                    row.metrics.cov_med.insert(subset_label(combo), *score);
                }
            }
        }

        // Walk sizes descending; the first size with a passing subset
        // decides. NaN scores are never candidates.
        let mut chosen: Option<Vec<u32>> = None;
        for size in (2..=n).rev() {
            let mut best_at_size: Option<(&[u32], f64)> = None;
            for (combo, score) in scored.iter().filter(|(c, _)| c.len() == size) {
                if score.is_nan() {
                    continue;
                }
                let better = match best_at_size {
                    None => true,
                    Some((_, best)) => *score < best,
                };
                if better {
                    best_at_size = Some((combo, *score));
                }
            }
            if let Some((combo, score)) = best_at_size {
                if score < threshold {
                    chosen = Some(combo.to_vec());
                    break;
                }
            }
        }
        let best = chosen.unwrap_or_else(|| reps.clone());

        for &rep in &reps {
            if !best.contains(&rep) {
                if let Some(row) = table.find_row_mut(key, rep) {
                    if row.flag(CheckId::CovMed) {
                        summary.outliers += 1;
                    }
                }
            }
        }
    }
    summary
}
