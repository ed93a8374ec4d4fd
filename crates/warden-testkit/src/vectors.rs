//! Golden credential vectors.
//!
//! Stored strings produced with fixed salts. Any encoder that claims to read
//! the `digest` format must accept each vector's password and reject every
//! other password.

use serde::{Deserialize, Serialize};
use warden_auth::{DigestEncryptor, PasswordEncryptor};

/// One known-answer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenVector {
    pub name: String,
    pub password: String,
    pub stored: String,
}

/// All golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "sha256_single_round".into(),
            password: "zeePassword".into(),
            stored: "digest:SHA-256:1:16:AAECAwQFBgcICQoLDA0ODw==:uU6Q0EUZUGelZ38SVYmi0FqGx3ZBShSDZt7xIee7zd4="
                .into(),
        },
        GoldenVector {
            name: "sha256_thousand_rounds".into(),
            password: "secret".into(),
            stored: "digest:SHA-256:1000:16:paWlpaWlpaWlpaWlpaWlpQ==:9U//0MP1KG6h7E9IMUE3LZw74pPRcOx7SGLf0Dyxf40="
                .into(),
        },
        GoldenVector {
            name: "sha512_short_salt_unicode".into(),
            password: "pässwörd".into(),
            stored: "digest:SHA-512:10:8:AAECAwQFBgc=:zrW27zAypOnoz/lwMO0ah0dI16LCosfIiE0pBIj3MBWp80kd+qtQpjUkgrZJTyRMjX4Fbw9srDVJ5ZMKA5gc/g=="
                .into(),
        },
    ]
}

/// Check every vector. Returns the names of the ones that fail.
pub fn verify_all_vectors() -> Vec<String> {
    let encryptor = DigestEncryptor::default();
    all_vectors()
        .into_iter()
        .filter(|vector| {
            let accepted = encryptor
                .check_password(Some(&vector.password), Some(&vector.stored))
                .unwrap_or(false);
            let wrong = format!("{}x", vector.password);
            let rejected = !encryptor
                .check_password(Some(&wrong), Some(&vector.stored))
                .unwrap_or(true);
            !(accepted && rejected)
        })
        .map(|vector| vector.name)
        .collect()
}

/// The vectors as JSON, for other implementations of the format.
pub fn export_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}
