//! Runner that applies the quality assessors in their fixed order.

use std::path::Path;

use log::info;

use crate::assess::{
    apply_auto_audit, assess_mapping_quality, assess_mutation_efficiency,
    assess_replicate_concordance, assess_resistance_markers, ConcordanceSummary, MappingSummary,
    MarkerSummary, MutationSummary,
};
use crate::config::QcThresholds;
use crate::data::{AlignmentLogStore, ExpressionMatrix, SampleGroups, SampleTable};
use crate::error::{QcError, Result};

/// Check input and output paths before any data is read.
///
/// An existing report is never clobbered, and a missing counts file or
/// output directory fails here rather than after the expensive stages, so
/// no partial output is ever produced.
pub fn preflight(counts_path: &Path, output_path: &Path) -> Result<()> {
    if output_path.exists() {
        return Err(QcError::OutputExists(output_path.to_path_buf()));
    }
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(QcError::MissingInput(parent.to_path_buf()));
        }
    }
    if !counts_path.is_file() {
        return Err(QcError::MissingInput(counts_path.to_path_buf()));
    }
    Ok(())
}

/// Aggregated outcome of a pipeline run.
///
/// A stage that was skipped for want of configuration (no wildtype, no
/// markers) leaves its summary as `None`.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub mapping: Option<MappingSummary>,
    pub mutation: Option<MutationSummary>,
    pub markers: Option<MarkerSummary>,
    pub concordance: Option<ConcordanceSummary>,
    /// Rows whose status exceeded the audit threshold.
    pub audited: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(mapping) = &self.mapping {
            write!(f, "{}", mapping)?;
        }
        if let Some(mutation) = &self.mutation {
            write!(f, "{}", mutation)?;
        }
        if let Some(markers) = &self.markers {
            write!(f, "{}", markers)?;
        }
        if let Some(concordance) = &self.concordance {
            write!(f, "{}", concordance)?;
        }
        writeln!(f, "Auto-audit")?;
        writeln!(f, "  Marked: {}", self.audited)?;
        Ok(())
    }
}

/// Orchestrates the assessors over a loaded batch.
///
/// The stage order is fixed: mapping quality, mutation efficiency,
/// resistance markers, replicate concordance, then the auto-audit pass
/// over the accumulated status. Mutation needs a wildtype genotype and
/// markers need both a wildtype and a marker list; unconfigured stages
/// are skipped.
#[derive(Debug, Clone)]
pub struct QcPipeline {
    thresholds: QcThresholds,
    wildtype: Option<String>,
    markers: Vec<String>,
    condition_specific_fow: bool,
    audit_threshold: u32,
}

impl QcPipeline {
    /// Create a pipeline with the given threshold document.
    pub fn new(thresholds: QcThresholds) -> Self {
        QcPipeline {
            thresholds,
            wildtype: None,
            markers: Vec::new(),
            condition_specific_fow: false,
            audit_threshold: 0,
        }
    }

    /// Set the wildtype genotype used as expression baseline.
    pub fn wildtype(mut self, genotype: &str) -> Self {
        self.wildtype = Some(genotype.to_string());
        self
    }

    /// Set the resistance-marker gene ids to check.
    pub fn markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }

    /// Restrict the wildtype baseline to columns matching each row's
    /// condition values instead of pooling all wildtype columns.
    pub fn condition_specific_fow(mut self, enabled: bool) -> Self {
        self.condition_specific_fow = enabled;
        self
    }

    /// Set the status above which rows are marked for audit.
    pub fn audit_threshold(mut self, threshold: u32) -> Self {
        self.audit_threshold = threshold;
        self
    }

    #[inline]
    pub fn thresholds(&self) -> &QcThresholds {
        &self.thresholds
    }

    /// Run every configured stage over the batch.
    pub fn run(
        &self,
        table: &mut SampleTable,
        matrix: &ExpressionMatrix,
        groups: &SampleGroups,
        logs: &AlignmentLogStore,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        info!("assessing mapping quality");
        summary.mapping = Some(assess_mapping_quality(table, logs, &self.thresholds));

        match &self.wildtype {
            Some(wildtype) => {
                info!("assessing mutation efficiency against '{}'", wildtype);
                summary.mutation = Some(assess_mutation_efficiency(
                    table,
                    matrix,
                    groups,
                    wildtype,
                    self.condition_specific_fow,
                    &self.thresholds,
                ));
            }
            None => info!("no wildtype genotype configured; skipping mutation efficiency"),
        }

        match (&self.wildtype, self.markers.is_empty()) {
            (Some(wildtype), false) => {
                info!("assessing resistance markers ({})", self.markers.join(", "));
                summary.markers = Some(assess_resistance_markers(
                    table,
                    matrix,
                    wildtype,
                    &self.markers,
                    &self.thresholds,
                ));
            }
            _ => info!("wildtype or marker list not configured; skipping resistance markers"),
        }

        info!("assessing replicate concordance");
        summary.concordance = Some(assess_replicate_concordance(
            table,
            matrix,
            groups,
            &self.thresholds,
        ));

        info!("marking rows for audit (status > {})", self.audit_threshold);
        summary.audited = apply_auto_audit(table, &self.thresholds, self.audit_threshold);

        summary
    }
}
