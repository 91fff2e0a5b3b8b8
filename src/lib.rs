//! Sequencing Sample Quality Assessment Library
//!
//! This library scores the samples of a sequencing batch against a set of
//! configurable quality checks and produces an audit-ready summary table.
//! Inputs are the batch sample sheet, a normalized gene-by-sample
//! expression matrix and the per-sample aligner logs.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (SampleTable, ExpressionMatrix, alignment logs)
//! - **config**: Check identities and the threshold document
//! - **assess**: The quality assessors (mapping, mutation, markers, concordance, audit)
//! - **pipeline**: Stage orchestration and path preflight
//! - **report**: Summary-table assembly and TSV output
//!
//! # Example
//!
//! ```no_run
//! use sample_qc::prelude::*;
//!
//! // Load data
//! let conditions = vec!["TREATMENT".to_string(), "TIMEPOINT".to_string()];
//! let mut table = SampleTable::from_csv("samples.csv", &conditions).unwrap();
//! let matrix = ExpressionMatrix::from_csv("counts.csv").unwrap();
//! let logs = AlignmentLogStore::from_dir("logs/", "novoalign").unwrap();
//! let groups = table.group_index(&matrix);
//!
//! // Assess the batch and write the report
//! let summary = QcPipeline::new(QcThresholds::default())
//!     .wildtype("CNAG_WT")
//!     .markers(vec!["NAT".to_string(), "G418".to_string()])
//!     .run(&mut table, &matrix, &groups, &logs);
//! println!("{}", summary);
//!
//! let markers = vec!["NAT".to_string(), "G418".to_string()];
//! QcReport::build(&table, &QcThresholds::default(), &markers)
//!     .to_tsv("quality_summary.tsv")
//!     .unwrap();
//! ```

pub mod assess;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod stats;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::assess::{
        apply_auto_audit, assess_mapping_quality, assess_mutation_efficiency,
        assess_replicate_concordance, assess_resistance_markers, ConcordanceSummary,
        MappingSummary, MarkerSummary, MutationSummary, MAX_SUBSET_REPS,
    };
    pub use crate::config::{CheckId, CheckRule, QcThresholds};
    pub use crate::data::{
        find_duplicate_keys, normalize_sample_key, AlignmentLog, AlignmentLogStore,
        ExpressionMatrix, GroupKey, Metrics, SampleGroups, SampleRow, SampleTable,
    };
    pub use crate::error::{QcError, Result};
    pub use crate::pipeline::{preflight, QcPipeline, RunSummary};
    pub use crate::report::QcReport;
}
