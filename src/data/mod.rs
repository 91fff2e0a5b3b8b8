//! Input data structures for a QC run.

mod alignment;
mod expression;
mod sample_table;

pub use alignment::{AlignmentLog, AlignmentLogStore};
pub use expression::ExpressionMatrix;
pub use sample_table::{
    find_duplicate_keys, normalize_sample_key, GroupKey, Metrics, SampleGroups, SampleRow,
    SampleTable,
};
