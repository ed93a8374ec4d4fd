//! Effective permission sets and their provenance.

use serde::{Deserialize, Serialize};
use std::fmt;

use warden_core::{Permission, PermissionSet, Resource};

/// Where a contribution to an effective set came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionSource {
    /// Assigned directly on the target.
    Direct,
    /// Assigned on an ancestor of the target's domain.
    DomainAncestor { domain: String },
    /// Assigned globally on the target's class within a domain.
    Global { domain: String },
    /// Held by a resource the accessor inherits from.
    Inherited { from: Resource },
    /// Absorbed through `*SUPER-USER` on the owning domain.
    SuperUser { domain: String },
}

impl fmt::Display for PermissionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionSource::Direct => write!(f, "direct"),
            PermissionSource::DomainAncestor { domain } => write!(f, "ancestor domain {}", domain),
            PermissionSource::Global { domain } => write!(f, "global in {}", domain),
            PermissionSource::Inherited { from } => write!(f, "inherited from {}", from),
            PermissionSource::SuperUser { domain } => write!(f, "super-user on {}", domain),
        }
    }
}

/// The permissions an accessor effectively holds on one target.
#[derive(Debug, Clone)]
pub struct EffectivePermissions<P> {
    set: PermissionSet<P>,
    absorbed: bool,
    sources: Vec<PermissionSource>,
}

impl<P: Permission> EffectivePermissions<P> {
    pub fn empty() -> Self {
        Self {
            set: PermissionSet::new(),
            absorbed: false,
            sources: Vec::new(),
        }
    }

    /// Fold a contribution in. Grant flags only grow.
    pub fn add(&mut self, source: PermissionSource, contribution: PermissionSet<P>) {
        if contribution.is_empty() {
            return;
        }
        self.set.union(&contribution);
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    /// Mark the set as absorbing: every applicable permission, with grant.
    pub fn absorb(&mut self, source: PermissionSource, applicable: impl IntoIterator<Item = P>) {
        let mut full = self.set.with_all_grants();
        for permission in applicable {
            full.merge_in(permission.with_all_grants());
        }
        self.set = full;
        self.absorbed = true;
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    /// Whether `required` is held, with its grant flag if it asks for one.
    pub fn has(&self, required: &P) -> bool {
        self.absorbed || self.set.satisfies(required)
    }

    /// Whether every permission in `required` is held.
    pub fn has_all(&self, required: &PermissionSet<P>) -> bool {
        required.iter().all(|permission| self.has(permission))
    }

    /// Whether the holder may assign `requested` to someone else.
    pub fn can_grant(&self, requested: &P) -> bool {
        self.absorbed
            || self
                .set
                .get(requested.key())
                .is_some_and(|held| requested.is_grantable_from(held))
    }

    pub fn is_absorbed(&self) -> bool {
        self.absorbed
    }

    pub fn sources(&self) -> &[PermissionSource] {
        &self.sources
    }

    pub fn set(&self) -> &PermissionSet<P> {
        &self.set
    }

    pub fn into_set(self) -> PermissionSet<P> {
        self.set
    }
}

impl<P: Permission> Default for EffectivePermissions<P> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{DomainPermission, ResourceCreatePermission, ResourcePermission};

    fn perm(name: &str, grant: bool) -> ResourcePermission {
        ResourcePermission::with_grant_option(name, grant).unwrap()
    }

    #[test]
    fn test_union_keeps_grant() {
        let mut effective = EffectivePermissions::empty();
        effective.add(PermissionSource::Direct, [perm("view", false)].into_iter().collect());
        effective.add(
            PermissionSource::Global {
                domain: "root".into(),
            },
            [perm("view", true)].into_iter().collect(),
        );
        assert!(effective.has(&perm("view", true)));
        assert!(effective.can_grant(&perm("view", false)));
        assert_eq!(effective.sources().len(), 2);
    }

    #[test]
    fn test_empty_contribution_not_recorded() {
        let mut effective = EffectivePermissions::<ResourcePermission>::empty();
        effective.add(PermissionSource::Direct, PermissionSet::new());
        assert!(effective.sources().is_empty());
    }

    #[test]
    fn test_absorbed_holds_everything_with_grant() {
        let mut effective = EffectivePermissions::empty();
        effective.add(
            PermissionSource::Direct,
            [DomainPermission::new("*SUPER-USER").unwrap()].into_iter().collect(),
        );
        effective.absorb(
            PermissionSource::SuperUser {
                domain: "root".into(),
            },
            DomainPermission::all_system(),
        );

        assert!(effective.is_absorbed());
        assert!(effective.can_grant(&DomainPermission::with_grant("anything").unwrap()));
        assert!(effective
            .set()
            .contains(&DomainPermission::with_grant("*SUPER-USER").unwrap()));
        assert_eq!(effective.set().len(), 3);
    }

    #[test]
    fn test_create_grant_needs_both_flags() {
        let mut effective = EffectivePermissions::empty();
        effective.add(
            PermissionSource::Direct,
            [
                ResourceCreatePermission::create_with_grant(),
                ResourceCreatePermission::post_create_with_grant(perm("view", false)),
            ]
            .into_iter()
            .collect(),
        );
        assert!(effective.can_grant(&ResourceCreatePermission::create()));
        assert!(effective.can_grant(&ResourceCreatePermission::post_create(perm("view", false))));
        assert!(!effective.can_grant(&ResourceCreatePermission::post_create(perm("view", true))));
    }
}
