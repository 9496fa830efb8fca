//! Error types for the warden-approval crate.

use crate::types::ApprovalStatus;

/// Errors from the approval queue and its stores. Denials and timeouts are
/// ordinary outcomes, never errors; only persistence and invariant failures
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// No request persisted under this id
    #[error("Approval request not found: {0}")]
    NotFound(String),

    /// Attempted transition out of a terminal status
    #[error("Approval {id} is already {status}")]
    AlreadyResolved { id: String, status: ApprovalStatus },

    /// Invalid persisted row
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
