//! Mutation-efficiency assessment: perturbed-gene expression against the
//! wildtype baseline.
//!
//! A genotype names its perturbations as dot-separated tokens; a `_over`
//! suffix marks overexpression, anything else is a deletion. Each token is
//! scored as FOW (fold over wildtype): the row's expression of the gene
//! divided by the mean expression in the wildtype baseline samples.

use log::warn;

use crate::config::{CheckId, QcThresholds};
use crate::data::{ExpressionMatrix, SampleGroups, SampleTable};
use crate::stats;

const OVEREXPRESSION_SUFFIX: &str = "_over";

/// Outcome of the mutation-efficiency stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationSummary {
    /// Mutant rows scored.
    pub assessed: usize,
    /// Mutant rows skipped whole (no matrix column or no baseline).
    pub skipped_rows: usize,
    /// Individual tokens skipped (gene not in the matrix).
    pub skipped_genes: usize,
    /// Rows that picked up at least one flag here.
    pub flagged: usize,
}

impl std::fmt::Display for MutationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mutation efficiency")?;
        writeln!(f, "  Assessed:      {}", self.assessed)?;
        writeln!(f, "  Skipped rows:  {}", self.skipped_rows)?;
        writeln!(f, "  Skipped genes: {}", self.skipped_genes)?;
        writeln!(f, "  Flagged:       {}", self.flagged)?;
        Ok(())
    }
}

/// Matrix columns of the wildtype baseline.
///
/// `conditions: Some(...)` restricts the baseline to wildtype groups whose
/// condition tuple matches (condition-specific mode); `None` pools every
/// wildtype sample.
fn baseline_columns(
    groups: &SampleGroups,
    matrix: &ExpressionMatrix,
    wildtype: &str,
    conditions: Option<&[String]>,
) -> Vec<usize> {
    let mut cols = Vec::new();
    for (key, members) in groups {
        if key.genotype != wildtype {
            continue;
        }
        if let Some(cond) = conditions {
            if key.conditions != cond {
                continue;
            }
        }
        cols.extend(members.values().filter_map(|s| matrix.sample_col(s)));
    }
    cols
}

/// Score every mutant row's perturbed genes against the wildtype baseline.
///
/// Deletion fails the check when FOW rises above its threshold (residual
/// expression); overexpression fails when FOW falls below its threshold or
/// is the +infinity zero-baseline sentinel, which cannot evidence an
/// overexpression either way. Each polarity contributes to a row's status
/// at most once, however many tokens fail.
///
/// `metrics.mut_fow` gets one entry per token in token order; tokens that
/// had to be skipped are recorded as NaN so positions stay aligned.
///
/// # Arguments
/// * `table` - Sample table to annotate
/// * `matrix` - Normalized expression
/// * `groups` - Replicate group index over the matrix
/// * `wildtype` - Wildtype genotype name
/// * `condition_specific` - Baseline restricted to matching conditions
/// * `thresholds` - QC threshold document
pub fn assess_mutation_efficiency(
    table: &mut SampleTable,
    matrix: &ExpressionMatrix,
    groups: &SampleGroups,
    wildtype: &str,
    condition_specific: bool,
    thresholds: &QcThresholds,
) -> MutationSummary {
    let deletion_threshold = thresholds.threshold(CheckId::DeletionFow);
    let over_threshold = thresholds.threshold(CheckId::OverexpressionFow);
    let pooled_baseline = if condition_specific {
        None
    } else {
        Some(baseline_columns(groups, matrix, wildtype, None))
    };

    let mut summary = MutationSummary::default();
    for row in table.rows_mut() {
        if row.genotype == wildtype {
            continue;
        }
        let n_tokens = row.genotype_tokens();

        let sample_col = match matrix.sample_col(&row.sample_id) {
            Some(col) => col,
            None => {
                warn!(
                    "sample '{}' has no expression-matrix column; skipping mutation assessment",
                    row.sample_id
                );
                row.metrics.mut_fow = vec![f64::NAN; n_tokens];
                summary.skipped_rows += 1;
                continue;
            }
        };
        let baseline = match &pooled_baseline {
            Some(cols) => cols.clone(),
            None => baseline_columns(groups, matrix, wildtype, Some(&row.conditions)),
        };
        if baseline.is_empty() {
            warn!(
                "sample '{}' has no wildtype baseline{}; skipping mutation assessment",
                row.sample_id,
                if condition_specific {
                    " matching its conditions"
                } else {
                    ""
                }
            );
            row.metrics.mut_fow = vec![f64::NAN; n_tokens];
            summary.skipped_rows += 1;
            continue;
        }

        summary.assessed += 1;
        // Owned copy: flag() needs the row mutably inside the token loop.
        let genotype = row.genotype.clone();
        let mut fows = Vec::with_capacity(n_tokens);
        let mut newly_flagged = false;
        for token in genotype.split('.') {
            let overexpression = token.ends_with(OVEREXPRESSION_SUFFIX);
            let gene = token.strip_suffix(OVEREXPRESSION_SUFFIX).unwrap_or(token);
            let gene_row = match matrix.gene_row(gene) {
                Some(r) => r,
                None => {
                    warn!("gene '{}' is not in the expression matrix; skipping", gene);
                    fows.push(f64::NAN);
                    summary.skipped_genes += 1;
                    continue;
                }
            };
            let wt_values: Vec<f64> = baseline
                .iter()
                .map(|&col| matrix.value(gene_row, col))
                .collect();
            // Missing baseline cells are ignored, not propagated: a single
            // NA wildtype count must not blank the check for everyone.
            let wt_mean = stats::nan_mean(&wt_values);
            let fow = if wt_mean == 0.0 {
                warn!("gene '{}' has zero mean expression in the wildtype baseline", gene);
                f64::INFINITY
            } else {
                matrix.value(gene_row, sample_col) / wt_mean
            };

            let failed = if overexpression {
                fow < over_threshold || fow.is_infinite()
            } else {
                fow > deletion_threshold
            };
            if failed {
                let check = if overexpression {
                    CheckId::OverexpressionFow
                } else {
                    CheckId::DeletionFow
                };
                newly_flagged |= row.flag(check);
            }
            fows.push(fow);
        }
        row.metrics.mut_fow = fows;
        if newly_flagged {
            summary.flagged += 1;
        }
    }
    summary
}
