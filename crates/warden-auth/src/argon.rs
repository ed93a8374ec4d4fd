//! Argon2id encoder.
//!
//! Stored as `argon2:<PHC string>`. The PHC string carries the salt and the
//! cost parameters, so verification never depends on the current settings.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::encryptor::{cleaned_bytes, null_outcome, strip_own_prefix, PasswordEncryptor};
use crate::error::{EncryptorError, Result};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

fn contexts() -> &'static RwLock<HashMap<Argon2Params, Arc<Argon2<'static>>>> {
    static POOL: OnceLock<RwLock<HashMap<Argon2Params, Arc<Argon2<'static>>>>> = OnceLock::new();
    POOL.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Fetch (or build) the shared Argon2id context for `params`.
///
/// Contexts are immutable and never evicted.
pub fn context(params: Argon2Params) -> Result<Arc<Argon2<'static>>> {
    if let Ok(pool) = contexts().read() {
        if let Some(hit) = pool.get(&params) {
            return Ok(Arc::clone(hit));
        }
    }
    let built = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
        .map_err(|e| EncryptorError::InvalidParameters(e.to_string()))?;
    let mut pool = contexts()
        .write()
        .map_err(|_| EncryptorError::Hashing("argon2 pool lock poisoned".into()))?;
    let entry = pool
        .entry(params)
        .or_insert_with(|| Arc::new(Argon2::new(Algorithm::Argon2id, Version::V0x13, built)));
    Ok(Arc::clone(entry))
}

/// Argon2id encoder.
#[derive(Debug, Clone, Default)]
pub struct Argon2Encryptor {
    params: Argon2Params,
}

impl Argon2Encryptor {
    pub const NAME: &'static str = "argon2";

    pub fn new(params: Argon2Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> Argon2Params {
        self.params
    }
}

impl PasswordEncryptor for Argon2Encryptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encrypt_password(&self, password: Option<&str>) -> Result<Option<String>> {
        let Some(password) = password else {
            return Ok(None);
        };
        let argon = context(self.params)?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon
            .hash_password(&cleaned_bytes(password), &salt)
            .map_err(|e| EncryptorError::Hashing(e.to_string()))?;
        Ok(Some(format!("{}:{}", Self::NAME, hash)))
    }

    fn check_password(&self, password: Option<&str>, stored: Option<&str>) -> Result<bool> {
        if let Some(outcome) = null_outcome(password, stored) {
            return Ok(outcome);
        }
        let (password, stored) = (password.unwrap_or_default(), stored.unwrap_or_default());

        let phc = strip_own_prefix(Self::NAME, stored)?;
        let parsed = PasswordHash::new(phc).map_err(|e| {
            tracing::warn!(error = %e, "malformed argon2 credential");
            EncryptorError::Malformed(e.to_string())
        })?;
        let stored_params = Params::try_from(&parsed)
            .map_err(|e| EncryptorError::Malformed(e.to_string()))?;
        let argon = context(Argon2Params {
            memory_kib: stored_params.m_cost(),
            iterations: stored_params.t_cost(),
            parallelism: stored_params.p_cost(),
        })?;

        match argon.verify_password(&cleaned_bytes(password), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(EncryptorError::Hashing(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Encryptor {
        Argon2Encryptor::new(Argon2Params {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_fresh_salt_each_call() {
        let encryptor = cheap();
        let a = encryptor.encrypt_password(Some("zeePassword")).unwrap().unwrap();
        let b = encryptor.encrypt_password(Some("zeePassword")).unwrap().unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("argon2:$argon2id$"));
        assert!(encryptor.check_password(Some("zeePassword"), Some(&a)).unwrap());
        assert!(encryptor.check_password(Some("zeePassword"), Some(&b)).unwrap());
        assert!(!encryptor.check_password(Some("zeePassword2"), Some(&b)).unwrap());
    }

    #[test]
    fn test_verifies_with_stored_costs() {
        let stored = cheap().encrypt_password(Some("pw")).unwrap().unwrap();
        let stronger = Argon2Encryptor::new(Argon2Params {
            memory_kib: 512,
            iterations: 2,
            parallelism: 1,
        });
        assert!(stronger.check_password(Some("pw"), Some(&stored)).unwrap());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            cheap().check_password(Some("pw"), Some("argon2:not-a-phc-string")),
            Err(EncryptorError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_params() {
        let broken = Argon2Encryptor::new(Argon2Params {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        });
        assert!(matches!(
            broken.encrypt_password(Some("pw")),
            Err(EncryptorError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_null_password() {
        assert_eq!(cheap().encrypt_password(None).unwrap(), None);
        assert!(cheap().check_password(None, None).unwrap());
    }

    #[test]
    fn test_composed_and_decomposed_match() {
        let stored = cheap()
            .encrypt_password(Some("cafe\u{301}-pass"))
            .unwrap()
            .unwrap();
        assert!(cheap()
            .check_password(Some("caf\u{e9}-pass"), Some(&stored))
            .unwrap());
    }
}
