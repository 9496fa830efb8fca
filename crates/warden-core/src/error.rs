//! Error types for the warden-core crate.

/// Core error type for the warden security engine.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
