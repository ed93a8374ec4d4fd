//! Error types for the access control facade.

use thiserror::Error;
use warden_auth::{EncryptorError, SessionError};
use warden_core::ValidationError;
use warden_perms::PermsError;
use warden_store::StoreError;

/// Errors that can occur during access control operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Malformed argument, independent of who asks.
    #[error("invalid argument: {0}")]
    Validation(#[from] ValidationError),

    /// The session lacks a required permission or grant.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Unknown resource, domain or resource class.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid session transition.
    #[error("invalid session state: {0}")]
    InvalidState(#[from] SessionError),

    /// Credentials did not match.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// Credential encoding error.
    #[error("credential encoding error: {0}")]
    Encryptor(#[from] EncryptorError),
}

/// Coarse classification of an [`AccessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotAuthorized,
    NotFound,
    InvalidState,
    Authentication,
    Infrastructure,
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Validation(_) => ErrorKind::Validation,
            AccessError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            AccessError::NotFound(_) => ErrorKind::NotFound,
            AccessError::InvalidState(_) => ErrorKind::InvalidState,
            AccessError::Authentication(_) => ErrorKind::Authentication,
            AccessError::Store(_) | AccessError::Encryptor(_) => ErrorKind::Infrastructure,
        }
    }

    pub(crate) fn not_authorized(message: impl Into<String>) -> Self {
        AccessError::NotAuthorized(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        AccessError::Validation(ValidationError::Invalid(message.into()))
    }
}

impl From<StoreError> for AccessError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(what) => AccessError::NotFound(what),
            StoreError::AlreadyExists(what) => AccessError::invalid(format!("{} already exists", what)),
            other => AccessError::Store(other),
        }
    }
}

impl From<PermsError> for AccessError {
    fn from(error: PermsError) -> Self {
        match error {
            PermsError::Validation(e) => AccessError::Validation(e),
            PermsError::Store(e) => e.into(),
        }
    }
}

/// Result type for access control operations.
pub type Result<T> = std::result::Result<T, AccessError>;
