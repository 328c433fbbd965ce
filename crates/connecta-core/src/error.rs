//! Error taxonomy for the reporting engine.
//!
//! Only failures of a *required* input surface here. A failing fan-out source
//! is absorbed into its [`SourceOutcome`](crate::fanout::SourceOutcome) and a
//! malformed envelope degrades to an empty collection; neither is an error.

/// Reporting engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportingError {
    /// The anchor record of a detail view could not be fetched or decoded.
    #[error("root record {id} not found: {reason}")]
    RootNotFound { id: String, reason: String },

    /// A source the caller declared mandatory failed.
    #[error("source {source_name} unavailable: {detail}")]
    SourceUnavailable { source_name: String, detail: String },

    #[error("export error: {0}")]
    Export(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for ReportingError {
    fn from(err: csv::Error) -> Self {
        ReportingError::Export(err.to_string())
    }
}

/// Result type for reporting operations.
pub type Result<T> = std::result::Result<T, ReportingError>;
