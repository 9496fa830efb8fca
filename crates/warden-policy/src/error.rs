//! Error types for the warden-policy crate.

/// Errors raised while building policy machinery. Checks themselves never
/// fail; a denied or unparseable input is a decision, not an error.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A deny-list rule failed to compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
