//! Permission sets.
//!
//! A [`PermissionSet`] holds at most one entry per permission key. Building a
//! set from a literal that names the same permission twice with different
//! grant flags is a caller error; inserting into an existing set replaces.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::permission::Permission;

/// A set of permissions keyed by normalized name.
#[derive(Debug, Clone)]
pub struct PermissionSet<P> {
    entries: BTreeMap<String, P>,
}

impl<P: Permission> PermissionSet<P> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Build a set, rejecting conflicting duplicates.
    ///
    /// The same permission listed twice with identical flags is accepted.
    pub fn try_from_iter<I>(iter: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = P>,
    {
        let mut entries: BTreeMap<String, P> = BTreeMap::new();
        for permission in iter {
            match entries.get(permission.key()) {
                Some(existing) if *existing != permission => {
                    return Err(ValidationError::DuplicatePermission(
                        permission.key().to_string(),
                    ));
                }
                Some(_) => {}
                None => {
                    entries.insert(permission.key().to_string(), permission);
                }
            }
        }
        Ok(Self { entries })
    }

    /// Insert a permission, replacing any entry with the same key.
    pub fn insert(&mut self, permission: P) -> Option<P> {
        self.entries.insert(permission.key().to_string(), permission)
    }

    /// Fold a permission into the set. Grant flags only ever grow.
    pub fn merge_in(&mut self, permission: P) {
        match self.entries.get_mut(permission.key()) {
            Some(existing) => existing.merge(&permission),
            None => {
                self.entries.insert(permission.key().to_string(), permission);
            }
        }
    }

    /// Fold every entry of `other` into the set.
    pub fn union(&mut self, other: &PermissionSet<P>) {
        for permission in other.iter() {
            self.merge_in(permission.clone());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<P> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&P> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether the set holds exactly this permission.
    pub fn contains(&self, permission: &P) -> bool {
        self.entries.get(permission.key()) == Some(permission)
    }

    /// Whether some entry satisfies `required`.
    pub fn satisfies(&self, required: &P) -> bool {
        self.entries
            .get(required.key())
            .is_some_and(|held| required.is_satisfied_by(held))
    }

    /// Whether every entry of `required` is satisfied.
    pub fn satisfies_all(&self, required: &PermissionSet<P>) -> bool {
        required.iter().all(|permission| self.satisfies(permission))
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the set with every grant flag set.
    pub fn with_all_grants(&self) -> Self {
        self.iter().map(Permission::with_all_grants).collect()
    }
}

impl<P: Permission> Default for PermissionSet<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Permission> PartialEq for PermissionSet<P> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<P: Permission> Eq for PermissionSet<P> {}

/// Collecting keeps the last entry per key.
impl<P: Permission> FromIterator<P> for PermissionSet<P> {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut set = Self::new();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl<P: Permission> IntoIterator for PermissionSet<P> {
    type Item = P;
    type IntoIter = std::collections::btree_map::IntoValues<String, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<'a, P: Permission> IntoIterator for &'a PermissionSet<P> {
    type Item = &'a P;
    type IntoIter = std::collections::btree_map::Values<'a, String, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl<P: Permission + Serialize> Serialize for PermissionSet<P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'de, P: Permission + Deserialize<'de>> Deserialize<'de> for PermissionSet<P> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<P>::deserialize(deserializer)?;
        Self::try_from_iter(items).map_err(D::Error::custom)
    }
}
