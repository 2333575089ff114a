//! Error types for inckmeans.

use thiserror::Error;

/// inckmeans error types.
#[derive(Error, Debug)]
pub enum IncKMeansError {
    /// Malformed input record (wrong arity or non-numeric field)
    #[error("Parse error in record {record:?}: {reason}")]
    Parse { record: String, reason: String },

    /// Malformed wire-format key or aggregate
    #[error("Decode error: {0}")]
    Decode(String),

    /// Coordinate count disagrees with the model dimensionality
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Cluster id outside the model
    #[error("Unknown cluster: {0}")]
    UnknownCluster(usize),

    /// Rejected engine configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// JSON config parsing error
    #[error("Config JSON error: {0}")]
    ConfigJson(#[from] serde_json::Error),

    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IncKMeansError {
    pub(crate) fn parse(record: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            record: record.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }
}

/// Result type alias for inckmeans operations.
pub type Result<T> = std::result::Result<T, IncKMeansError>;
