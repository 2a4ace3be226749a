//! Error types for the FeedPilot engine.

/// Errors that can occur in the engine.
///
/// Most failure paths never reach the caller: scoring and strategy failures
/// are recovered locally and only logged. What remains here is what a host
/// can actually observe.
#[derive(thiserror::Error, Debug)]
pub enum PilotError {
    #[error("Invalid import: {0}")]
    InvalidImport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Candidate source error: {0}")]
    Source(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type PilotResult<T> = Result<T, PilotError>;
