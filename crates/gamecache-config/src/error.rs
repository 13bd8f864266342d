//! Shared error taxonomy for the cache keeper control plane.
//!
//! Every subsystem error eventually narrows to one of these variants so
//! callers (job runners, the scheduler, the IPC-facing layer that consumes
//! this crate) can apply one retry/backoff policy regardless of which
//! component raised it.

use thiserror::Error;

/// Shared error type for control-plane operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g. home directory not found).
    #[error("path error: {0}")]
    Path(String),

    /// Cryptographic error (bad key, failed authentication tag check).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Retryable failure: network blip, external tool temporarily
    /// unavailable, timeout. Callers may retry with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// The operation was cancelled cooperatively; not a failure.
    #[error("cancelled")]
    Cancelled,

    /// Request conflicts with an already-running operation of the same
    /// kind (and, for scoped kinds, the same scope).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller-provided input is malformed or fails validation.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Authentication/authorization failure.
    #[error("auth error: {0}")]
    Auth(String),

    /// Unrecoverable failure; retrying will not help.
    #[error("fatal error: {0}")]
    Fatal(String),
}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
