use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by Quadrangle stores and services.
#[derive(Debug, Error)]
pub enum ForumError {
    /// The acting user is not allowed to perform this write. Surfaced to the
    /// caller, never retried.
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// A referenced document vanished between read and write.
    #[error("document not found")]
    NotFound { doc_id: Option<String> },

    /// Optimistic concurrency guard detected a stale version.
    #[error("version conflict (expected {expected:?}, actual {actual:?})")]
    VersionConflict {
        expected: Option<u64>,
        actual: Option<u64>,
    },

    /// A state-machine precondition no longer holds, e.g. accepting an
    /// already-resolved friend request.
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Underlying Redis command failed.
    #[error("network error: {0}")]
    Network(#[from] redis::RedisError),

    /// Invalid input supplied to an operation.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Catch-all for plumbing failures (serialization, protocol decode).
    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl ForumError {
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn not_found(doc_id: impl Into<String>) -> Self {
        Self::NotFound {
            doc_id: Some(doc_id.into()),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether a bounded re-read-and-retry is appropriate for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

impl From<serde_json::Error> for ForumError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other {
            message: Cow::Owned(format!("serialization error: {err}")),
        }
    }
}
