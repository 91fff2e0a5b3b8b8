//! Quality assessors applied to an annotated sample table.
//!
//! Each assessor inspects one aspect of a sequencing run and flags the
//! rows that fail its configured check:
//!
//! - **Mapping**: library depth and alignment rate from aligner logs
//! - **Mutation**: perturbation efficiency (fold-over-wildtype)
//! - **Markers**: resistance-cassette expression consistency
//! - **Concordance**: replicate agreement via subset CoV medians
//!
//! [`apply_auto_audit`] runs last and marks rows whose accumulated
//! status exceeds the audit threshold.

mod audit;
mod concordance;
mod mapping;
mod markers;
mod mutation;

pub use audit::apply_auto_audit;
pub use concordance::{
    assess_replicate_concordance, replicate_combinations, subset_label, ConcordanceSummary,
    MAX_SUBSET_REPS,
};
pub use mapping::{assess_mapping_quality, MappingSummary};
pub use markers::{assess_resistance_markers, MarkerSummary};
pub use mutation::{assess_mutation_efficiency, MutationSummary};
