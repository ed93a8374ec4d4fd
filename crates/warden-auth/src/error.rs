//! Error types for credential encoding and session state.

use thiserror::Error;
use warden_core::Resource;

/// Errors raised by a [`crate::PasswordEncryptor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptorError {
    /// No encoder is registered under the stored string's prefix.
    #[error("no password encryptor registered for algorithm {0}")]
    UnknownAlgorithm(String),

    /// The stored string was produced by a different encoder.
    #[error("stored credential is for algorithm {found}, expected {expected}")]
    WrongAlgorithm { expected: String, found: String },

    /// The stored string could not be parsed.
    #[error("malformed stored credential: {0}")]
    Malformed(String),

    /// Hashing parameters are out of range.
    #[error("invalid hashing parameters: {0}")]
    InvalidParameters(String),

    /// The underlying hash primitive failed.
    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// Invalid transitions of the authentication state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("already authenticated as {0}")]
    AlreadyAuthenticated(Resource),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("already impersonating {0}")]
    AlreadyImpersonating(Resource),

    #[error("not impersonating")]
    NotImpersonating,
}

/// Result type for encoder operations.
pub type Result<T> = std::result::Result<T, EncryptorError>;
