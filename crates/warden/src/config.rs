//! Configuration for an access control context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warden_auth::{
    Argon2Encryptor, Argon2Params, DigestEncryptor, DigestParams, EncryptorRegistry,
    PasswordEncryptor,
};
use warden_core::{NameMatching, Resource};

/// Which encoder produces newly stored credentials.
///
/// Credentials written by the other built-in encoder, with any parameters,
/// remain verifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptorChoice {
    Digest(DigestParams),
    Argon2(Argon2Params),
}

impl Default for EncryptorChoice {
    fn default() -> Self {
        EncryptorChoice::Digest(DigestParams::default())
    }
}

impl EncryptorChoice {
    /// Build the encoder for new credentials.
    pub fn build(&self) -> Arc<dyn PasswordEncryptor> {
        match *self {
            EncryptorChoice::Digest(params) => Arc::new(DigestEncryptor::new(params)),
            EncryptorChoice::Argon2(params) => Arc::new(Argon2Encryptor::new(params)),
        }
    }

    /// The built-in registry with this choice as the default encoder.
    pub fn registry(&self) -> EncryptorRegistry {
        EncryptorRegistry::standard(self.build())
    }
}

/// Configuration for a [`crate::Warden`] and its contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// The resource that bypasses every authorization check.
    pub system_resource: Resource,
    /// Domain the system resource lives in.
    pub system_domain: String,
    /// Class of the system resource.
    pub system_class: String,
    /// How custom permission names compare.
    pub name_matching: NameMatching,
    /// Encoder for new credentials.
    pub encryptor: EncryptorChoice,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            system_resource: Resource::SYSTEM,
            system_domain: "SYSTEM".to_string(),
            system_class: "SYSTEM".to_string(),
            name_matching: NameMatching::CaseSensitive,
            encryptor: EncryptorChoice::default(),
        }
    }
}
