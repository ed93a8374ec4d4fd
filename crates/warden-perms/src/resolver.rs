//! Effective-permission resolver.
//!
//! Every query walks the same sources: the accessor's `*INHERIT` closure,
//! crossed with the target and (for domain-scoped targets) every ancestor
//! domain. The result is folded into an [`EffectivePermissions`] and, if the
//! accessor is super-user on the owning domain, absorbed.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, trace};
use warden_core::{
    DomainCreatePermission, DomainPermission, Permission, PermissionRow, PermissionSet, Resource,
    ResourceClassInfo, ResourceCreatePermission, ResourcePermission,
};
use warden_store::{PermissionKind, PermissionTarget, Store, StoreExt};

use crate::effective::{EffectivePermissions, PermissionSource};
use crate::error::Result;

/// Resolves effective permissions against a store snapshot.
pub struct Resolver<'a, S: Store + ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> Resolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Building Blocks
    // ─────────────────────────────────────────────────────────────────────────

    /// Directly assigned permissions of `accessor` on `target`.
    pub fn direct<P: Permission>(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
    ) -> Result<PermissionSet<P>> {
        rows_to_set(&self.store.direct_permissions(accessor, target)?)
    }

    /// The accessor followed by every resource it inherits from, transitively.
    ///
    /// Only direct `*INHERIT` resource permissions form edges.
    pub fn inheritance_closure(&self, accessor: Resource) -> Result<Vec<Resource>> {
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([accessor]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current);

            for target in self
                .store
                .permission_targets(current, PermissionKind::Resource)?
            {
                let PermissionTarget::Resource(inherited) = target else {
                    continue;
                };
                if visited.contains(&inherited) {
                    continue;
                }
                let rows = self.store.direct_permissions(current, &target)?;
                if rows.iter().any(|row| row.name == ResourcePermission::INHERIT) {
                    trace!(from = %current, inherits = %inherited, "following inherit edge");
                    queue.push_back(inherited);
                }
            }
        }
        debug!(accessor = %accessor, closure = order.len(), "resolved inherit closure");
        Ok(order)
    }

    /// Whether granting `accessor` `*INHERIT` on `target` would close a loop.
    pub fn would_inherit_cycle(&self, accessor: Resource, target: Resource) -> Result<bool> {
        if accessor == target {
            return Ok(true);
        }
        let cycle = self.inheritance_closure(target)?.contains(&accessor);
        if cycle {
            debug!(accessor = %accessor, target = %target, "inherit would close a cycle");
        }
        Ok(cycle)
    }

    fn gather<P: Permission>(
        &self,
        accessor: Resource,
        targets: &[(PermissionTarget, PermissionSource)],
    ) -> Result<EffectivePermissions<P>> {
        let mut effective = EffectivePermissions::empty();
        for holder in self.inheritance_closure(accessor)? {
            for (target, source) in targets {
                let contribution = self.direct::<P>(holder, target)?;
                let source = if holder == accessor {
                    source.clone()
                } else {
                    PermissionSource::Inherited { from: holder }
                };
                effective.add(source, contribution);
            }
        }
        Ok(effective)
    }

    fn domain_scoped_targets(
        &self,
        domain: &str,
        make: impl Fn(String) -> PermissionTarget,
        own_source: impl Fn(String) -> PermissionSource,
    ) -> Result<Vec<(PermissionTarget, PermissionSource)>> {
        Ok(self
            .store
            .domain_ancestors(domain)?
            .into_iter()
            .map(|ancestor| {
                let source = if ancestor == domain {
                    own_source(ancestor.clone())
                } else {
                    PermissionSource::DomainAncestor {
                        domain: ancestor.clone(),
                    }
                };
                (make(ancestor), source)
            })
            .collect())
    }

    /// Every resource permission valid for the class, with grant.
    pub fn applicable_resource_permissions(
        &self,
        class: &ResourceClassInfo,
    ) -> Result<Vec<ResourcePermission>> {
        let mut applicable = ResourcePermission::all_system(class.authenticatable);
        for name in self.store.resource_permission_names(&class.name)? {
            applicable.push(ResourcePermission::with_grant(&name)?);
        }
        Ok(applicable)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Domain Permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Effective domain permissions of `accessor` on `domain`.
    pub fn domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
    ) -> Result<EffectivePermissions<DomainPermission>> {
        let targets = self.domain_scoped_targets(
            domain,
            PermissionTarget::Domain,
            |_| PermissionSource::Direct,
        )?;
        let mut effective = self.gather::<DomainPermission>(accessor, &targets)?;
        if effective.set().contains_key(DomainPermission::SUPER_USER) {
            effective.absorb(
                PermissionSource::SuperUser {
                    domain: domain.to_string(),
                },
                DomainPermission::all_system(),
            );
        }
        Ok(effective)
    }

    /// Whether `accessor` holds `*SUPER-USER` on `domain`, directly or inherited.
    pub fn is_super_user(&self, accessor: Resource, domain: &str) -> Result<bool> {
        Ok(self.domain_permissions(accessor, domain)?.is_absorbed())
    }

    /// Effective domain permissions on every domain where any are held.
    pub fn domain_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<BTreeMap<String, PermissionSet<DomainPermission>>> {
        let mut map = BTreeMap::new();
        for domain in self.store.domain_names()? {
            let effective = self.domain_permissions(accessor, &domain)?;
            if !effective.set().is_empty() {
                map.insert(domain, effective.into_set());
            }
        }
        Ok(map)
    }

    /// Effective domain-create permissions of `accessor`.
    pub fn domain_create_permissions(
        &self,
        accessor: Resource,
    ) -> Result<EffectivePermissions<DomainCreatePermission>> {
        self.gather(
            accessor,
            &[(PermissionTarget::DomainCreate, PermissionSource::Direct)],
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Effective permissions of `accessor` on the resource `accessed`.
    pub fn resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
    ) -> Result<EffectivePermissions<ResourcePermission>> {
        let record = self.store.require_resource(accessed)?;
        let class = self.store.require_resource_class(&record.class)?;

        let mut targets = vec![(PermissionTarget::Resource(accessed), PermissionSource::Direct)];
        targets.extend(self.domain_scoped_targets(
            &record.domain,
            |domain| PermissionTarget::Global {
                class: class.name.clone(),
                domain,
            },
            |domain| PermissionSource::Global { domain },
        )?);

        let mut effective = self.gather::<ResourcePermission>(accessor, &targets)?;
        if self.is_super_user(accessor, &record.domain)? {
            effective.absorb(
                PermissionSource::SuperUser {
                    domain: record.domain.clone(),
                },
                self.applicable_resource_permissions(&class)?,
            );
        }
        Ok(effective)
    }

    /// Effective global permissions of `accessor` on `class` within `domain`.
    pub fn global_resource_permissions(
        &self,
        accessor: Resource,
        class: &ResourceClassInfo,
        domain: &str,
    ) -> Result<EffectivePermissions<ResourcePermission>> {
        let targets = self.domain_scoped_targets(
            domain,
            |domain| PermissionTarget::Global {
                class: class.name.clone(),
                domain,
            },
            |domain| PermissionSource::Global { domain },
        )?;
        let mut effective = self.gather::<ResourcePermission>(accessor, &targets)?;
        if self.is_super_user(accessor, domain)? {
            effective.absorb(
                PermissionSource::SuperUser {
                    domain: domain.to_string(),
                },
                self.applicable_resource_permissions(class)?,
            );
        }
        Ok(effective)
    }

    /// Effective global permissions keyed by domain, then class name.
    pub fn global_resource_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<BTreeMap<String, BTreeMap<String, PermissionSet<ResourcePermission>>>> {
        let classes = self.classes()?;
        let mut map: BTreeMap<String, BTreeMap<String, PermissionSet<ResourcePermission>>> =
            BTreeMap::new();
        for domain in self.store.domain_names()? {
            for class in &classes {
                let effective = self.global_resource_permissions(accessor, class, &domain)?;
                if !effective.set().is_empty() {
                    map.entry(domain.clone())
                        .or_default()
                        .insert(class.name.clone(), effective.into_set());
                }
            }
        }
        Ok(map)
    }

    /// Effective resource-create permissions of `accessor` for `class` in `domain`.
    pub fn resource_create_permissions(
        &self,
        accessor: Resource,
        class: &ResourceClassInfo,
        domain: &str,
    ) -> Result<EffectivePermissions<ResourceCreatePermission>> {
        let targets = self.domain_scoped_targets(
            domain,
            |domain| PermissionTarget::ResourceCreate {
                class: class.name.clone(),
                domain,
            },
            |_| PermissionSource::Direct,
        )?;
        let mut effective = self.gather::<ResourceCreatePermission>(accessor, &targets)?;
        if self.is_super_user(accessor, domain)? {
            let applicable = self
                .applicable_resource_permissions(class)?
                .into_iter()
                .map(ResourceCreatePermission::post_create_with_grant)
                .chain(std::iter::once(ResourceCreatePermission::create_with_grant()));
            effective.absorb(
                PermissionSource::SuperUser {
                    domain: domain.to_string(),
                },
                applicable,
            );
        }
        Ok(effective)
    }

    /// Effective resource-create permissions keyed by domain, then class name.
    pub fn resource_create_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<BTreeMap<String, BTreeMap<String, PermissionSet<ResourceCreatePermission>>>> {
        let classes = self.classes()?;
        let mut map: BTreeMap<String, BTreeMap<String, PermissionSet<ResourceCreatePermission>>> =
            BTreeMap::new();
        for domain in self.store.domain_names()? {
            for class in &classes {
                let effective = self.resource_create_permissions(accessor, class, &domain)?;
                if !effective.set().is_empty() {
                    map.entry(domain.clone())
                        .or_default()
                        .insert(class.name.clone(), effective.into_set());
                }
            }
        }
        Ok(map)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Resources of `class` on which `accessor` effectively holds `permission`,
    /// optionally restricted to `domain` and its descendants.
    pub fn resources_by_permission(
        &self,
        accessor: Resource,
        class: &ResourceClassInfo,
        permission: &ResourcePermission,
        domain: Option<&str>,
    ) -> Result<Vec<Resource>> {
        let scope = match domain {
            Some(domain) => Some(self.store.domain_descendants(domain)?),
            None => None,
        };

        let mut found = Vec::new();
        for candidate in self.store.resources_of_class(&class.name)? {
            if let Some(scope) = &scope {
                let record = self.store.require_resource(candidate)?;
                if !scope.contains(&record.domain) {
                    continue;
                }
            }
            if self.resource_permissions(accessor, candidate)?.has(permission) {
                found.push(candidate);
            }
        }
        Ok(found)
    }

    /// Resources of `class` that effectively hold `permission` on `accessed`.
    pub fn accessors_by_permission(
        &self,
        accessed: Resource,
        class: &ResourceClassInfo,
        permission: &ResourcePermission,
    ) -> Result<Vec<Resource>> {
        let mut found = Vec::new();
        for candidate in self.store.resources_of_class(&class.name)? {
            if self.resource_permissions(candidate, accessed)?.has(permission) {
                found.push(candidate);
            }
        }
        Ok(found)
    }

    fn classes(&self) -> Result<Vec<ResourceClassInfo>> {
        let mut classes = Vec::new();
        for name in self.store.resource_class_names()? {
            classes.push(self.store.require_resource_class(&name)?);
        }
        Ok(classes)
    }
}

fn rows_to_set<P: Permission>(rows: &[PermissionRow]) -> Result<PermissionSet<P>> {
    let mut set = PermissionSet::new();
    for row in rows {
        set.merge_in(P::from_row(row)?);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_store::MemoryStore;

    struct World {
        store: MemoryStore,
        alice: Resource,
        bob: Resource,
        account: Resource,
    }

    fn rows<P: Permission>(permissions: &[P]) -> Vec<PermissionRow> {
        permissions.iter().map(Permission::to_row).collect()
    }

    fn dp(name: &str, grant: bool) -> DomainPermission {
        DomainPermission::with_grant_option(name, grant).unwrap()
    }

    fn rp(name: &str, grant: bool) -> ResourcePermission {
        ResourcePermission::with_grant_option(name, grant).unwrap()
    }

    fn world() -> World {
        let store = MemoryStore::new();
        store.create_domain("root", None).unwrap();
        store.create_domain("root/sales", Some("root")).unwrap();
        store.create_domain("other", None).unwrap();
        store
            .create_resource_class(&ResourceClassInfo::new("User", true, false))
            .unwrap();
        store
            .create_resource_class(&ResourceClassInfo::new("Account", false, false))
            .unwrap();
        store.create_resource_permission("Account", "view").unwrap();
        store.create_resource_permission("Account", "edit").unwrap();

        let _system = store.create_resource("User", "root", None).unwrap();
        let alice = store.create_resource("User", "root", None).unwrap();
        let bob = store.create_resource("User", "root", None).unwrap();
        let account = store.create_resource("Account", "root/sales", None).unwrap();
        World {
            store,
            alice,
            bob,
            account,
        }
    }

    #[test]
    fn test_domain_permissions_flow_down_not_up() {
        let w = world();
        w.store
            .put_permissions(w.alice, &PermissionTarget::Domain("root".into()), &rows(&[dp("view", false)]))
            .unwrap();

        let resolver = Resolver::new(&w.store);
        let below = resolver.domain_permissions(w.alice, "root/sales").unwrap();
        assert!(below.has(&dp("view", false)));
        assert!(!below.has(&dp("edit", false)));
        assert_eq!(
            below.sources(),
            &[PermissionSource::DomainAncestor {
                domain: "root".into()
            }]
        );

        w.store
            .put_permissions(w.bob, &PermissionTarget::Domain("root/sales".into()), &rows(&[dp("view", false)]))
            .unwrap();
        assert!(resolver.domain_permissions(w.bob, "root").unwrap().set().is_empty());
    }

    #[test]
    fn test_grant_monotonic_across_paths() {
        let w = world();
        w.store
            .put_permissions(w.alice, &PermissionTarget::Domain("root".into()), &rows(&[dp("view", true)]))
            .unwrap();
        w.store
            .put_permissions(w.alice, &PermissionTarget::Domain("root/sales".into()), &rows(&[dp("view", false)]))
            .unwrap();

        let effective = Resolver::new(&w.store)
            .domain_permissions(w.alice, "root/sales")
            .unwrap();
        assert!(effective.set().contains(&dp("view", true)));
        assert_eq!(effective.set().len(), 1);
    }

    #[test]
    fn test_super_user_absorbs_resource_permissions() {
        let w = world();
        w.store
            .put_permissions(w.alice, &PermissionTarget::Domain("root".into()), &rows(&[dp("*SUPER-USER", false)]))
            .unwrap();

        let resolver = Resolver::new(&w.store);
        let effective = resolver.resource_permissions(w.alice, w.account).unwrap();
        assert!(effective.is_absorbed());
        assert!(effective.set().contains(&rp("view", true)));
        assert!(effective.set().contains(&rp("edit", true)));
        assert!(effective.set().contains(&rp("*DELETE", true)));
        assert!(!effective.set().contains_key("*IMPERSONATE"));

        let domain = resolver.domain_permissions(w.alice, "root/sales").unwrap();
        assert!(domain.set().contains(&dp("*SUPER-USER", true)));
        assert!(!resolver.is_super_user(w.alice, "other").unwrap());
    }

    #[test]
    fn test_global_permissions_apply_to_resources_below() {
        let w = world();
        let global = PermissionTarget::Global {
            class: "Account".into(),
            domain: "root".into(),
        };
        w.store.put_permissions(w.alice, &global, &rows(&[rp("view", false)])).unwrap();

        let resolver = Resolver::new(&w.store);
        let effective = resolver.resource_permissions(w.alice, w.account).unwrap();
        assert!(effective.has(&rp("view", false)));

        let class = w.store.require_resource_class("Account").unwrap();
        assert_eq!(
            resolver
                .resources_by_permission(w.alice, &class, &rp("view", false), Some("root/sales"))
                .unwrap(),
            vec![w.account]
        );
        assert!(resolver
            .resources_by_permission(w.alice, &class, &rp("view", false), Some("other"))
            .unwrap()
            .is_empty());

        let users = w.store.require_resource_class("User").unwrap();
        assert_eq!(
            resolver
                .accessors_by_permission(w.account, &users, &rp("view", false))
                .unwrap(),
            vec![w.alice]
        );
    }

    #[test]
    fn test_inherit_is_transitive() {
        let w = world();
        let carol = w.store.create_resource("User", "root", None).unwrap();

        w.store
            .put_permissions(w.alice, &PermissionTarget::Resource(w.bob), &rows(&[rp("*INHERIT", false)]))
            .unwrap();
        w.store
            .put_permissions(w.bob, &PermissionTarget::Resource(carol), &rows(&[rp("*INHERIT", false)]))
            .unwrap();
        w.store
            .put_permissions(carol, &PermissionTarget::Resource(w.account), &rows(&[rp("edit", true)]))
            .unwrap();

        let resolver = Resolver::new(&w.store);
        assert_eq!(
            resolver.inheritance_closure(w.alice).unwrap(),
            vec![w.alice, w.bob, carol]
        );
        let effective = resolver.resource_permissions(w.alice, w.account).unwrap();
        assert!(effective.has(&rp("edit", true)));
        assert_eq!(effective.sources(), &[PermissionSource::Inherited { from: carol }]);

        assert!(resolver.would_inherit_cycle(carol, w.alice).unwrap());
        assert!(resolver.would_inherit_cycle(w.alice, w.alice).unwrap());
        assert!(!resolver.would_inherit_cycle(w.alice, carol).unwrap());
    }

    #[test]
    fn test_resource_create_absorption() {
        let w = world();
        w.store
            .put_permissions(w.alice, &PermissionTarget::Domain("root".into()), &rows(&[dp("*SUPER-USER", false)]))
            .unwrap();
        let class = w.store.require_resource_class("Account").unwrap();

        let effective = Resolver::new(&w.store)
            .resource_create_permissions(w.alice, &class, "root/sales")
            .unwrap();
        assert!(effective.set().contains(&ResourceCreatePermission::create_with_grant()));
        assert!(effective
            .set()
            .contains(&ResourceCreatePermission::post_create_with_grant(rp("view", true))));
    }

    #[test]
    fn test_maps_skip_empty_entries() {
        let w = world();
        w.store
            .put_permissions(
                w.alice,
                &PermissionTarget::ResourceCreate {
                    class: "Account".into(),
                    domain: "root".into(),
                },
                &rows(&[ResourceCreatePermission::create()]),
            )
            .unwrap();
        w.store
            .put_permissions(w.alice, &PermissionTarget::Domain("root/sales".into()), &rows(&[dp("view", false)]))
            .unwrap();

        let resolver = Resolver::new(&w.store);
        let domains = resolver.domain_permissions_map(w.alice).unwrap();
        assert_eq!(domains.keys().collect::<Vec<_>>(), vec!["root/sales"]);

        let creates = resolver.resource_create_permissions_map(w.alice).unwrap();
        assert_eq!(creates.len(), 2);
        assert!(creates["root/sales"].contains_key("Account"));
        assert!(!creates.contains_key("other"));
    }
}
