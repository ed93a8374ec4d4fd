//! Per-pair write serialization.
//!
//! A permission replacement reads the current direct set, checks grant
//! authority on the delta and writes. Two writers on the same
//! (accessor, target) pair must not interleave those steps. Writers on
//! different pairs never wait for each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use warden_core::Resource;
use warden_store::{PermissionTarget, StoreError};

use crate::error::Result;

type PairKey = (Resource, PermissionTarget);

/// Lazily created mutexes, one per (accessor, target) pair in use.
#[derive(Debug, Default)]
pub struct PairLocks {
    pairs: Mutex<HashMap<PairKey, Arc<Mutex<()>>>>,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `(accessor, target)`.
    pub fn with_lock<T>(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let key = (accessor, target.clone());
        let pair = {
            let mut pairs = self.pairs.lock().map_err(poisoned)?;
            Arc::clone(pairs.entry(key.clone()).or_default())
        };

        let outcome = {
            let _guard = pair.lock().map_err(poisoned)?;
            f()
        };

        // Drop the entry once nobody else is waiting on it.
        let mut pairs = self.pairs.lock().map_err(poisoned)?;
        if Arc::strong_count(&pair) == 2 {
            pairs.remove(&key);
        }
        outcome
    }

    /// Number of pairs currently tracked.
    pub fn len(&self) -> usize {
        self.pairs.lock().map(|pairs| pairs.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(error: E) -> StoreError {
    StoreError::LockPoisoned(error.to_string())
}
