//! Error types for the key service.
//!
//! Two layers of errors exist:
//! - [`StoreError`] is what a [`KeyStore`](crate::store::KeyStore) reports.
//! - [`KeyError`] is what the lifecycle service returns to its callers. It
//!   carries an [`ErrorKind`] that the gateway maps to a transport status.
//!
//! Store errors are classified into a `KeyError` exactly once, in the service
//! layer, and never re-wrapped above it.

use thiserror::Error;

/// Errors reported by a key store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A key with the same id already exists.
    #[error("key {0} already exists")]
    DuplicateId(String),

    /// No matching key exists. For allocation and listing this means the
    /// unissued pool is empty.
    #[error("key not found")]
    NotFound,

    /// Cancellation was attempted on a key that was never issued.
    #[error("the key was not issued")]
    NotIssued,

    /// Cancellation was attempted on a key that is already canceled.
    #[error("the key has already been canceled")]
    AlreadyCanceled,

    /// The backend failed for a reason unrelated to key state.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a backend error with the given message.
    #[must_use]
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Kind of a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller misuse or an unclassified storage failure.
    BadParams,
    /// Entity absent or unissued pool exhausted.
    NotFound,
    /// Request conflicts with the key's current state.
    Conflict,
    /// Unexpected fault. The message is never shown to callers.
    Internal,
}

impl ErrorKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadParams => "bad_params",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

/// Error returned by [`KeyLifecycleService`](crate::service::KeyLifecycleService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct KeyError {
    /// Classification used for client-side branching.
    pub kind: ErrorKind,
    /// Short human-readable message.
    pub message: String,
}

impl KeyError {
    /// Create an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a bad-params error.
    #[must_use]
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadParams, message)
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Message safe to show to a caller. Internal details are withheld.
    #[must_use]
    pub fn public_message(&self) -> &str {
        match self.kind {
            ErrorKind::Internal => "internal error",
            _ => &self.message,
        }
    }
}

/// Configuration loading errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is present but its value cannot be used.
    #[error("invalid {name}: {reason}")]
    Invalid {
        /// Variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
