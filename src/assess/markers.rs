//! Resistance-marker assessment: is the right selection cassette expressed
//! in the right samples?
//!
//! Every perturbation replaces (or accompanies) a gene with a resistance
//! marker, so mutant samples should express exactly the expected marker and
//! wildtype samples none at all. Marker levels are scored as FOM (fold over
//! median): expression divided by a reference median taken across mutant
//! samples that cleanly express that one marker.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::config::{CheckId, QcThresholds};
use crate::data::{ExpressionMatrix, SampleTable};
use crate::stats;

/// Outcome of the resistance-marker stage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkerSummary {
    /// Reference median per marker (NaN when undefined).
    pub references: BTreeMap<String, f64>,
    /// Rows skipped because they have no matrix column.
    pub skipped_rows: usize,
    /// Rows that picked up the marker flag.
    pub flagged: usize,
}

impl std::fmt::Display for MarkerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Resistance markers")?;
        for (marker, reference) in &self.references {
            if reference.is_nan() {
                writeln!(f, "  {} reference: undefined", marker)?;
            } else {
                writeln!(f, "  {} reference: {:.3}", marker, reference)?;
            }
        }
        writeln!(f, "  Skipped rows: {}", self.skipped_rows)?;
        writeln!(f, "  Flagged:      {}", self.flagged)?;
        Ok(())
    }
}

/// Score marker expression for every row and flag inconsistent patterns.
///
/// The reference median for a marker is taken over mutant samples (rows
/// with a non-wildtype genotype) whose expression of that marker exceeds
/// the configured noise floor while every other configured marker is
/// silent; with no qualifying sample the reference, and every FOM against
/// it, stays NaN.
///
/// Two patterns flag [`CheckId::MarkerFom`], each at most once per row:
/// a wildtype row with any elevated marker (contamination), and a
/// compound-genotype row with more than one elevated marker (the sample
/// cannot be attributed to a single construct).
///
/// # Arguments
/// * `table` - Sample table to annotate
/// * `matrix` - Normalized expression
/// * `wildtype` - Wildtype genotype name
/// * `markers` - Configured resistance-marker gene ids
/// * `thresholds` - QC threshold document
pub fn assess_resistance_markers(
    table: &mut SampleTable,
    matrix: &ExpressionMatrix,
    wildtype: &str,
    markers: &[String],
    thresholds: &QcThresholds,
) -> MarkerSummary {
    let threshold = thresholds.threshold(CheckId::MarkerFom);
    let noise_floor = thresholds.marker_noise_floor();

    // Classify matrix columns through the table; columns without a sheet
    // row have an unknown genotype and never qualify for a reference.
    let genotype_of: HashMap<&str, &str> = table
        .rows()
        .iter()
        .map(|r| (r.sample_id.as_str(), r.genotype.as_str()))
        .collect();
    let mutant_cols: Vec<usize> = matrix
        .sample_ids()
        .iter()
        .enumerate()
        .filter(|(_, id)| {
            genotype_of
                .get(id.as_str())
                .map_or(false, |g| *g != wildtype)
        })
        .map(|(col, _)| col)
        .collect();

    // Per marker: matrix row and reference median.
    let mut marker_refs: Vec<(String, Option<usize>, f64)> = Vec::with_capacity(markers.len());
    for marker in markers {
        let marker_row = matrix.gene_row(marker);
        let reference = match marker_row {
            Some(row) => {
                let other_rows: Vec<usize> = markers
                    .iter()
                    .filter(|m| *m != marker)
                    .filter_map(|m| matrix.gene_row(m))
                    .collect();
                let values: Vec<f64> = mutant_cols
                    .iter()
                    .filter_map(|&col| {
                        let v = matrix.value(row, col);
                        let clean = v > noise_floor
                            && other_rows.iter().all(|&r| matrix.value(r, col) == 0.0);
                        clean.then_some(v)
                    })
                    .collect();
                stats::median(&values)
            }
            None => {
                warn!("marker '{}' is not in the expression matrix", marker);
                f64::NAN
            }
        };
        if reference.is_nan() {
            warn!(
                "no clean mutant sample expresses marker '{}'; its FOM stays undefined",
                marker
            );
        }
        marker_refs.push((marker.clone(), marker_row, reference));
    }

    let mut summary = MarkerSummary::default();
    for (marker, _, reference) in &marker_refs {
        summary.references.insert(marker.clone(), *reference);
    }

    for row in table.rows_mut() {
        let sample_col = matrix.sample_col(&row.sample_id);
        if sample_col.is_none() {
            warn!(
                "sample '{}' has no expression-matrix column; marker FOMs stay undefined",
                row.sample_id
            );
            summary.skipped_rows += 1;
        }

        let mut elevated = 0usize;
        for (marker, marker_row, reference) in &marker_refs {
            let fom = match (marker_row, sample_col) {
                (Some(r), Some(c)) if !reference.is_nan() => matrix.value(*r, c) / reference,
                _ => f64::NAN,
            };
            row.metrics.marker_fom.insert(marker.clone(), fom);
            if fom > threshold * reference {
                elevated += 1;
            }
        }

        let is_wildtype = row.genotype == wildtype;
        let inconsistent = (is_wildtype && elevated >= 1)
            || (!is_wildtype && row.genotype_tokens() > 1 && elevated > 1);
        if inconsistent && row.flag(CheckId::MarkerFom) {
            summary.flagged += 1;
        }
    }
    summary
}
