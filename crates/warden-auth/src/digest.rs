//! Iterated salted digest encoder.
//!
//! `d0 = H(salt || password)`, then `d(i+1) = H(d(i))` for `iterations - 1`
//! rounds. Stored as
//! `digest:<ALGORITHM>:<iterations>:<saltSize>:<b64 salt>:<b64 digest>`, so
//! every parameter needed to verify travels with the value.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::encryptor::{cleaned_bytes, null_outcome, strip_own_prefix, PasswordEncryptor};
use crate::error::{EncryptorError, Result};

/// Hash primitive used by [`DigestEncryptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
    Blake3,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha512 => "SHA-512",
            DigestAlgorithm::Blake3 => "BLAKE3",
        }
    }

    fn hash(&self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            DigestAlgorithm::Sha512 => {
                let mut hasher = Sha512::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            DigestAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().as_bytes().to_vec()
            }
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = EncryptorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SHA-256" => Ok(DigestAlgorithm::Sha256),
            "SHA-512" => Ok(DigestAlgorithm::Sha512),
            "BLAKE3" => Ok(DigestAlgorithm::Blake3),
            other => Err(EncryptorError::Malformed(format!(
                "unknown digest algorithm {}",
                other
            ))),
        }
    }
}

/// Parameters of the digest encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigestParams {
    pub algorithm: DigestAlgorithm,
    pub iterations: u32,
    pub salt_size: usize,
}

impl Default for DigestParams {
    fn default() -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            iterations: 100_000,
            salt_size: 16,
        }
    }
}

impl DigestParams {
    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(EncryptorError::InvalidParameters(
                "iterations must be at least 1".into(),
            ));
        }
        if self.salt_size == 0 {
            return Err(EncryptorError::InvalidParameters(
                "salt size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Immutable hashing context for one parameter tuple.
#[derive(Debug)]
pub struct Digester {
    params: DigestParams,
}

impl Digester {
    pub fn params(&self) -> DigestParams {
        self.params
    }

    pub fn digest(&self, salt: &[u8], password: &[u8]) -> Vec<u8> {
        let algorithm = self.params.algorithm;
        let mut current = algorithm.hash(&[salt, password]);
        for _ in 1..self.params.iterations {
            current = algorithm.hash(&[current.as_slice()]);
        }
        current
    }

    fn fresh_salt(&self) -> Vec<u8> {
        let mut salt = vec![0u8; self.params.salt_size];
        rand::thread_rng().fill_bytes(&mut salt);
        salt
    }
}

/// Process-wide digesters, one per parameter tuple.
///
/// Populated lazily on first use and never evicted. Entries are immutable,
/// so a checked-out `Arc` may be used by any number of callers at once.
fn digesters() -> &'static RwLock<HashMap<DigestParams, Arc<Digester>>> {
    static POOL: OnceLock<RwLock<HashMap<DigestParams, Arc<Digester>>>> = OnceLock::new();
    POOL.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Fetch (or create) the shared digester for `params`.
pub fn digester(params: DigestParams) -> Result<Arc<Digester>> {
    params.validate()?;
    if let Ok(pool) = digesters().read() {
        if let Some(hit) = pool.get(&params) {
            return Ok(Arc::clone(hit));
        }
    }
    let mut pool = digesters()
        .write()
        .map_err(|_| EncryptorError::Hashing("digester pool lock poisoned".into()))?;
    let entry = pool
        .entry(params)
        .or_insert_with(|| Arc::new(Digester { params }));
    Ok(Arc::clone(entry))
}

/// Number of distinct parameter tuples cached so far.
pub fn cached_digesters() -> usize {
    digesters().read().map(|pool| pool.len()).unwrap_or(0)
}

struct StoredDigest {
    params: DigestParams,
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl StoredDigest {
    fn parse(rest: &str) -> Result<Self> {
        let fields: Vec<&str> = rest.split(':').collect();
        let [algorithm, iterations, salt_size, salt, digest] = fields.as_slice() else {
            return Err(EncryptorError::Malformed(format!(
                "expected 5 digest fields, found {}",
                fields.len()
            )));
        };
        let params = DigestParams {
            algorithm: algorithm.parse()?,
            iterations: iterations
                .parse()
                .map_err(|_| EncryptorError::Malformed(format!("bad iterations {}", iterations)))?,
            salt_size: salt_size
                .parse()
                .map_err(|_| EncryptorError::Malformed(format!("bad salt size {}", salt_size)))?,
        };
        let salt = BASE64
            .decode(salt)
            .map_err(|e| EncryptorError::Malformed(format!("salt: {}", e)))?;
        let digest = BASE64
            .decode(digest)
            .map_err(|e| EncryptorError::Malformed(format!("digest: {}", e)))?;
        if salt.len() != params.salt_size {
            return Err(EncryptorError::Malformed(format!(
                "salt is {} bytes, header says {}",
                salt.len(),
                params.salt_size
            )));
        }
        Ok(Self {
            params,
            salt,
            digest,
        })
    }
}

/// Iterated salted digest encoder.
#[derive(Debug, Clone, Default)]
pub struct DigestEncryptor {
    params: DigestParams,
}

impl DigestEncryptor {
    pub const NAME: &'static str = "digest";

    pub fn new(params: DigestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> DigestParams {
        self.params
    }
}

impl PasswordEncryptor for DigestEncryptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encrypt_password(&self, password: Option<&str>) -> Result<Option<String>> {
        let Some(password) = password else {
            return Ok(None);
        };
        let digester = digester(self.params)?;
        let salt = digester.fresh_salt();
        let digest = digester.digest(&salt, &cleaned_bytes(password));
        Ok(Some(format!(
            "{}:{}:{}:{}:{}:{}",
            Self::NAME,
            self.params.algorithm,
            self.params.iterations,
            self.params.salt_size,
            BASE64.encode(&salt),
            BASE64.encode(&digest)
        )))
    }

    fn check_password(&self, password: Option<&str>, stored: Option<&str>) -> Result<bool> {
        if let Some(outcome) = null_outcome(password, stored) {
            return Ok(outcome);
        }
        let (password, stored) = (password.unwrap_or_default(), stored.unwrap_or_default());

        let parsed = StoredDigest::parse(strip_own_prefix(Self::NAME, stored)?).map_err(|e| {
            tracing::warn!(error = %e, "malformed digest credential");
            e
        })?;
        // Verification uses the stored parameters, not this encoder's.
        let digester = digester(parsed.params)?;
        let candidate = digester.digest(&parsed.salt, &cleaned_bytes(password));
        Ok(candidate.ct_eq(&parsed.digest).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(algorithm: DigestAlgorithm) -> DigestEncryptor {
        DigestEncryptor::new(DigestParams {
            algorithm,
            iterations: 50,
            salt_size: 16,
        })
    }

    #[test]
    fn test_fresh_salt_each_call() {
        let encryptor = fast(DigestAlgorithm::Sha256);
        let a = encryptor.encrypt_password(Some("zeePassword")).unwrap().unwrap();
        let b = encryptor.encrypt_password(Some("zeePassword")).unwrap().unwrap();
        assert_ne!(a, b);
        assert!(encryptor.check_password(Some("zeePassword"), Some(&a)).unwrap());
        assert!(encryptor.check_password(Some("zeePassword"), Some(&b)).unwrap());
        assert!(!encryptor.check_password(Some("zeePassword2"), Some(&a)).unwrap());
    }

    #[test]
    fn test_stored_format() {
        let stored = fast(DigestAlgorithm::Sha512)
            .encrypt_password(Some("pw"))
            .unwrap()
            .unwrap();
        let fields: Vec<&str> = stored.split(':').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(&fields[..4], &["digest", "SHA-512", "50", "16"]);
        assert_eq!(BASE64.decode(fields[4]).unwrap().len(), 16);
        assert_eq!(BASE64.decode(fields[5]).unwrap().len(), 64);
    }

    #[test]
    fn test_verifies_with_stored_parameters() {
        let old = fast(DigestAlgorithm::Blake3)
            .encrypt_password(Some("pw"))
            .unwrap()
            .unwrap();
        let current = DigestEncryptor::new(DigestParams {
            algorithm: DigestAlgorithm::Sha256,
            iterations: 7,
            salt_size: 8,
        });
        assert!(current.check_password(Some("pw"), Some(&old)).unwrap());
    }

    #[test]
    fn test_iteration_count_matters() {
        let digester_one = digester(DigestParams {
            algorithm: DigestAlgorithm::Sha256,
            iterations: 1,
            salt_size: 4,
        })
        .unwrap();
        let single = digester_one.digest(b"salt", b"pw");
        let mut manual = Sha256::new();
        manual.update(b"salt");
        manual.update(b"pw");
        assert_eq!(single, manual.finalize().to_vec());

        let digester_two = digester(DigestParams {
            algorithm: DigestAlgorithm::Sha256,
            iterations: 2,
            salt_size: 4,
        })
        .unwrap();
        assert_eq!(digester_two.digest(b"salt", b"pw"), Sha256::digest(&single).to_vec());
    }

    #[test]
    fn test_pool_reuses_entries() {
        let params = DigestParams {
            algorithm: DigestAlgorithm::Blake3,
            iterations: 3,
            salt_size: 12,
        };
        let a = digester(params).unwrap();
        let b = digester(params).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cached_digesters() >= 1);
    }

    #[test]
    fn test_malformed_and_foreign() {
        let encryptor = fast(DigestAlgorithm::Sha256);
        assert!(matches!(
            encryptor.check_password(Some("pw"), Some("digest:SHA-256:1")),
            Err(EncryptorError::Malformed(_))
        ));
        assert!(matches!(
            encryptor.check_password(Some("pw"), Some("argon2:$argon2id$...")),
            Err(EncryptorError::WrongAlgorithm { .. })
        ));
        assert!(matches!(
            digester(DigestParams {
                algorithm: DigestAlgorithm::Sha256,
                iterations: 0,
                salt_size: 16,
            }),
            Err(EncryptorError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_null_password() {
        let encryptor = fast(DigestAlgorithm::Sha256);
        assert_eq!(encryptor.encrypt_password(None).unwrap(), None);
        assert!(encryptor.check_password(None, None).unwrap());
        let stored = encryptor.encrypt_password(Some("pw")).unwrap();
        assert!(!encryptor.check_password(None, stored.as_deref()).unwrap());
    }

    #[test]
    fn test_composed_and_decomposed_match() {
        let encryptor = fast(DigestAlgorithm::Sha256);
        let stored = encryptor
            .encrypt_password(Some("caf\u{e9}-pass"))
            .unwrap()
            .unwrap();
        assert!(encryptor
            .check_password(Some("cafe\u{301}-pass"), Some(&stored))
            .unwrap());
        assert!(!encryptor
            .check_password(Some("cafe-pass"), Some(&stored))
            .unwrap());
    }
}
