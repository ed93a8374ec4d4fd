//! Error types for Warden core values.

use thiserror::Error;

/// Validation errors: the input is malformed, independent of who asks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{what} name must not be empty")]
    EmptyName { what: &'static str },

    #[error("invalid system permission name: {0}")]
    UnknownSystemPermission(String),

    #[error("permission {0} is specified more than once with conflicting grant options")]
    DuplicatePermission(String),

    #[error("*CREATE must be specified")]
    MissingCreatePermission,

    #[error("permission {permission} is not defined for resource class {class}")]
    PermissionNotDefined { permission: String, class: String },

    #[error("system permission {permission} requires an authenticatable resource class, {class} is not")]
    RequiresAuthenticatable { permission: String, class: String },

    #[error("setting *INHERIT from {accessor} to {target} would cause a cycle")]
    InheritanceCycle { accessor: String, target: String },

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("password exceeds the maximum length of {0} bytes")]
    PasswordTooLong(usize),

    #[error("malformed permission row: {0}")]
    MalformedRow(String),

    #[error("invalid argument: {0}")]
    Invalid(String),
}
