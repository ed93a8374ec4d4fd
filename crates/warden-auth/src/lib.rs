//! # Warden Auth
//!
//! Credential encoding and the per-caller authentication state machine.
//!
//! ## Overview
//!
//! Credentials are stored as self-describing strings whose first field names
//! the encoder that produced them. The [`EncryptorRegistry`] dispatches
//! verification on that prefix, so several algorithms and parameter
//! generations can coexist and be migrated live.
//!
//! ## Key Types
//!
//! - [`PasswordEncryptor`] - The pluggable hashing contract
//! - [`DigestEncryptor`] - Iterated salted SHA-256 / SHA-512 / BLAKE3
//! - [`Argon2Encryptor`] - Argon2id in PHC format
//! - [`EncryptorRegistry`] - Prefix dispatch plus a default for new values
//! - [`SessionState`] - Unauthenticated / Authenticated / Impersonating
//!
//! ## Usage
//!
//! ```rust
//! use warden_auth::{DigestEncryptor, DigestParams, PasswordEncryptor};
//!
//! let encryptor = DigestEncryptor::new(DigestParams { iterations: 10, ..Default::default() });
//! let stored = encryptor.encrypt_password(Some("s3cret")).unwrap().unwrap();
//! assert!(stored.starts_with("digest:SHA-256:10:16:"));
//! assert!(encryptor.check_password(Some("s3cret"), Some(&stored)).unwrap());
//! ```
//!
//! ## Design Notes
//!
//! - **Fresh salt**: encoding the same password twice yields different strings.
//! - **Parameter pools**: hashing contexts are cached process-wide per
//!   parameter tuple, lazily, and never evicted. They are immutable, so a
//!   checked-out context may be shared freely.

pub mod argon;
pub mod digest;
pub mod encryptor;
pub mod error;
pub mod session;

pub use argon::{Argon2Encryptor, Argon2Params};
pub use digest::{DigestAlgorithm, DigestEncryptor, DigestParams};
pub use encryptor::{split_prefix, EncryptorRegistry, PasswordEncryptor};
pub use error::{EncryptorError, Result, SessionError};
pub use session::SessionState;
