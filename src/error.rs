//! Error types for the liveness engine

use thiserror::Error;

/// Errors that can occur while configuring or driving a liveness session.
///
/// Session outcomes such as a challenge timeout are not errors; they are
/// reported through [`crate::types::FailureReason`] on the completion event.
#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Malformed landmark set: layout needs {required} landmarks, frame has {actual}")]
    MalformedLandmarks { required: usize, actual: usize },

    #[error("Session state lock was poisoned")]
    LockPoisoned,
}
