//! Pipeline composition and execution for batch quality assessment.

mod runner;

pub use runner::{preflight, QcPipeline, RunSummary};
