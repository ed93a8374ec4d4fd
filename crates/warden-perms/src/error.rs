//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while resolving permissions.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Malformed input or stored row.
    #[error(transparent)]
    Validation(#[from] warden_core::ValidationError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] warden_store::StoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
