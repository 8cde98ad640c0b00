//! Error types for Draftsmith.
//!
//! Library crates use [`DraftsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Draftsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum DraftsmithError {
    /// The topic is empty after trimming.
    #[error("invalid topic: {message}")]
    InvalidTopic { message: String },

    /// The retrieval collaborator failed, timed out, or returned nothing usable.
    #[error("retrieval failure: {0}")]
    RetrievalFailure(String),

    /// A JSON-mode response was unparsable or missing required fields.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// The generation collaborator failed, timed out, or returned empty text.
    #[error("generation failure: {0}")]
    GenerationFailure(String),

    /// The critic never accepted the article within the revision budget.
    ///
    /// Carries the last produced article so callers can still deliver it.
    #[error("revision limit exceeded after {revisions} revisions")]
    RevisionLimitExceeded {
        revisions: usize,
        article: String,
        critique: String,
    },

    /// The caller cancelled the run between stages.
    #[error("run cancelled before stage {stage}")]
    Cancelled { stage: String },

    /// A stage was invoked without the state fields it requires.
    #[error("invalid pipeline state: {message}")]
    InvalidState { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DraftsmithError>;

impl DraftsmithError {
    /// Create an invalid-topic error from any displayable message.
    pub fn invalid_topic(msg: impl Into<String>) -> Self {
        Self::InvalidTopic {
            message: msg.into(),
        }
    }

    /// Create a retrieval failure from any displayable message.
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::RetrievalFailure(msg.into())
    }

    /// Create a malformed-response error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
        }
    }

    /// Create a generation failure from any displayable message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::GenerationFailure(msg.into())
    }

    /// Create an invalid-state error from any displayable message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a client wrapper may retry the failed call.
    ///
    /// Only service-level failures qualify; shape errors and empty results
    /// are deterministic and would fail again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::GenerationFailure(_) | Self::RetrievalFailure(_))
    }
}
