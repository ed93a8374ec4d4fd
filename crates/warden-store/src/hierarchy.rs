//! Domain hierarchy index.
//!
//! Domains form a forest. Ancestor chains are a parent-pointer walk, and
//! descendant sets are a walk of the reverse (children) index. Descendant
//! sets are memoized since the tree changes far less often than it is queried.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::traits::DomainRecord;

/// Index over the domain forest.
#[derive(Debug, Default)]
pub struct DomainForest {
    parents: BTreeMap<String, Option<String>>,
    children: BTreeMap<String, BTreeSet<String>>,
    descendants_cache: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl DomainForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a domain under an optional existing parent.
    pub fn insert(&mut self, name: &str, parent: Option<&str>) -> Result<()> {
        if self.parents.contains_key(name) {
            return Err(StoreError::AlreadyExists(format!("domain {}", name)));
        }
        if let Some(parent) = parent {
            if !self.parents.contains_key(parent) {
                return Err(StoreError::NotFound(format!("domain {}", parent)));
            }
            self.children
                .entry(parent.to_string())
                .or_default()
                .insert(name.to_string());
        }
        self.parents
            .insert(name.to_string(), parent.map(str::to_string));

        // Every ancestor's descendant set just grew.
        if let Ok(mut cache) = self.descendants_cache.lock() {
            cache.clear();
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<DomainRecord> {
        self.parents.get(name).map(|parent| DomainRecord {
            name: name.to_string(),
            parent: parent.clone(),
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.parents.keys().cloned().collect()
    }

    /// Chain from `name` up to its root, `name` first.
    pub fn ancestors(&self, name: &str) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut current = Some(name.to_string());
        while let Some(domain) = current {
            let parent = self
                .parents
                .get(&domain)
                .ok_or_else(|| StoreError::NotFound(format!("domain {}", domain)))?;
            current = parent.clone();
            chain.push(domain);
        }
        Ok(chain)
    }

    /// `name` and every domain below it.
    pub fn descendants(&self, name: &str) -> Result<BTreeSet<String>> {
        if !self.parents.contains_key(name) {
            return Err(StoreError::NotFound(format!("domain {}", name)));
        }
        if let Ok(cache) = self.descendants_cache.lock() {
            if let Some(hit) = cache.get(name) {
                return Ok(hit.clone());
            }
        }

        let mut result = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(domain) = stack.pop() {
            if let Some(children) = self.children.get(&domain) {
                stack.extend(children.iter().cloned());
            }
            result.insert(domain);
        }

        if let Ok(mut cache) = self.descendants_cache.lock() {
            cache.insert(name.to_string(), result.clone());
        }
        Ok(result)
    }
}
