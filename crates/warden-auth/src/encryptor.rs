//! The credential encoder contract and the prefix-dispatching registry.
//!
//! Every stored credential starts with the name of the encoder that produced
//! it, followed by `:`. A verifier can therefore pick the right encoder from
//! the stored string alone, and several algorithms (or parameter
//! generations) can live side by side in one store.

use std::collections::BTreeMap;
use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;

use crate::argon::Argon2Encryptor;
use crate::digest::DigestEncryptor;
use crate::error::{EncryptorError, Result};

/// A pluggable password hashing scheme.
///
/// `None` stands for an absent password. Encrypting `None` yields `None`,
/// and an absent password only matches an absent stored value.
pub trait PasswordEncryptor: Send + Sync {
    /// Unique algorithm name, used as the stored-string prefix.
    fn name(&self) -> &'static str;

    /// Encode a password with a fresh random salt.
    fn encrypt_password(&self, password: Option<&str>) -> Result<Option<String>>;

    /// Check a password against a value produced by `encrypt_password`.
    fn check_password(&self, password: Option<&str>, stored: Option<&str>) -> Result<bool>;
}

/// Split `name:rest` at the first colon.
pub fn split_prefix(stored: &str) -> Result<(&str, &str)> {
    stored
        .split_once(':')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| EncryptorError::Malformed("missing algorithm prefix".into()))
}

/// Strip this encoder's prefix from a stored string.
pub(crate) fn strip_own_prefix<'a>(expected: &str, stored: &'a str) -> Result<&'a str> {
    let (name, rest) = split_prefix(stored)?;
    if name != expected {
        return Err(EncryptorError::WrongAlgorithm {
            expected: expected.to_string(),
            found: name.to_string(),
        });
    }
    Ok(rest)
}

/// The bytes that get hashed: the password in Unicode NFC, so composed and
/// decomposed spellings of one password produce the same credential.
pub(crate) fn cleaned_bytes(password: &str) -> Vec<u8> {
    password.nfc().collect::<String>().into_bytes()
}

/// Outcome of comparing nullable inputs before any hashing happens.
pub(crate) fn null_outcome(password: Option<&str>, stored: Option<&str>) -> Option<bool> {
    match (password, stored) {
        (None, None) => Some(true),
        (None, Some(_)) | (Some(_), None) => Some(false),
        (Some(_), Some(_)) => None,
    }
}

/// Encoders keyed by name, with one default used for new credentials.
#[derive(Clone)]
pub struct EncryptorRegistry {
    encryptors: BTreeMap<&'static str, Arc<dyn PasswordEncryptor>>,
    default: &'static str,
}

impl EncryptorRegistry {
    /// A registry containing only `default`.
    pub fn new(default: Arc<dyn PasswordEncryptor>) -> Self {
        let name = default.name();
        let mut encryptors: BTreeMap<&'static str, Arc<dyn PasswordEncryptor>> = BTreeMap::new();
        encryptors.insert(name, default);
        Self {
            encryptors,
            default: name,
        }
    }

    /// The built-in encoders with default parameters, plus `default`, which
    /// replaces the built-in of the same name and encodes new credentials.
    pub fn standard(default: Arc<dyn PasswordEncryptor>) -> Self {
        let mut registry = Self::new(Arc::new(DigestEncryptor::default()));
        registry.register(Arc::new(Argon2Encryptor::default()));
        registry.default = default.name();
        registry.register(default);
        registry
    }

    /// Add (or replace) an encoder, used for verification only.
    pub fn register(&mut self, encryptor: Arc<dyn PasswordEncryptor>) {
        self.encryptors.insert(encryptor.name(), encryptor);
    }

    pub fn default_name(&self) -> &'static str {
        self.default
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.encryptors.keys().copied().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PasswordEncryptor>> {
        self.encryptors.get(name)
    }

    fn default_encryptor(&self) -> Result<&Arc<dyn PasswordEncryptor>> {
        self.encryptors
            .get(self.default)
            .ok_or_else(|| EncryptorError::UnknownAlgorithm(self.default.to_string()))
    }

    /// Encode with the default encoder.
    pub fn encrypt_password(&self, password: Option<&str>) -> Result<Option<String>> {
        self.default_encryptor()?.encrypt_password(password)
    }

    /// Verify with whichever encoder produced `stored`.
    pub fn check_password(&self, password: Option<&str>, stored: Option<&str>) -> Result<bool> {
        if let Some(outcome) = null_outcome(password, stored) {
            return Ok(outcome);
        }
        let stored = stored.unwrap_or_default();
        let (name, _) = split_prefix(stored)?;
        let encryptor = self
            .encryptors
            .get(name)
            .ok_or_else(|| EncryptorError::UnknownAlgorithm(name.to_string()))?;
        encryptor.check_password(password, Some(stored))
    }
}

impl std::fmt::Debug for EncryptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptorRegistry")
            .field("encryptors", &self.names())
            .field("default", &self.default)
            .finish()
    }
}
