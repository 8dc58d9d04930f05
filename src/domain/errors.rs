//! Error taxonomy of the synchronization pipeline
//!
//! Transient errors are retried locally by the retry controller and never
//! surface past the pipeline boundary except as a final FAILED status.
//! Terminal errors stop the run immediately. Callers only ever observe the
//! taxonomy category, never upstream error bodies.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("upstream unavailable ({status}): {message}")]
    UpstreamUnavailable { status: u16, message: String },

    #[error("upstream authentication failed ({status})")]
    UpstreamAuthFailure { status: u16 },

    #[error("upstream rejected the request ({status})")]
    UpstreamBadRequest { status: u16 },

    #[error("snapshot not ready yet: {0}")]
    SnapshotPending(String),

    #[error("a fresh load is already in progress")]
    Conflict,

    #[error("retry budget exhausted")]
    RetriesExhausted,

    #[error("pending retry was cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PipelineError {
    /// Whether the retry controller may schedule another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::SnapshotPending(_) | Self::Storage(_)
        )
    }

    /// Stable category name surfaced in status/audit and logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamAuthFailure { .. } => "UPSTREAM_AUTH_FAILURE",
            Self::UpstreamBadRequest { .. } => "UPSTREAM_BAD_REQUEST",
            Self::SnapshotPending(_) => "SNAPSHOT_PENDING",
            Self::Conflict => "CONFLICT",
            Self::RetriesExhausted => "RETRIES_EXHAUSTED",
            Self::Cancelled => "CANCELLED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}
