//! Error types for the sample-qc library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the library.
///
/// Variants cover the fatal setup failures (bad paths, malformed inputs,
/// invalid configuration). Recoverable per-sample conditions are handled
/// with logged warnings and sentinel metric values instead, with the one
/// exception of [`QcError::MissingAlignmentLog`], which the mapping stage
/// catches per row.
#[derive(Error, Debug)]
pub enum QcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output path already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Missing input path: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Missing column '{0}' in sample sheet")]
    MissingColumn(String),

    #[error("Invalid value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Malformed alignment log {}: {reason}", .path.display())]
    MalformedLog { path: PathBuf, reason: String },

    #[error("No alignment log for sample '{0}'")]
    MissingAlignmentLog(String),

    #[error("Duplicate key rows in sample sheet: {0}")]
    DuplicateKeys(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, QcError>;
