//! Plaintext password wrapper.

use std::fmt;

use crate::error::ValidationError;

/// Upper bound on accepted password length, in bytes.
pub const MAX_PASSWORD_LENGTH: usize = 512;

/// A plaintext password.
///
/// Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Wrap a plaintext password.
    ///
    /// Rejects passwords that are blank or longer than
    /// [`MAX_PASSWORD_LENGTH`] bytes. The value itself is kept untrimmed.
    pub fn new(plaintext: &str) -> Result<Self, ValidationError> {
        if plaintext.trim().is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        if plaintext.len() > MAX_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooLong(MAX_PASSWORD_LENGTH));
        }
        Ok(Self(plaintext.to_string()))
    }

    /// Access the plaintext.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

impl TryFrom<&str> for Password {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
