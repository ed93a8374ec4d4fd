//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite but keeps everything in memory with no
//! persistence. Each call takes the lock once, so every operation is atomic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use warden_core::{class_key, PermissionRow, Resource, ResourceClassInfo};

use crate::error::{Result, StoreError};
use crate::hierarchy::DomainForest;
use crate::traits::{DomainRecord, PermissionKind, PermissionTarget, ResourceRecord, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Domain forest.
    domains: DomainForest,

    /// Classes indexed by `class_key`.
    classes: BTreeMap<String, StoredClass>,

    /// Resources indexed by handle.
    resources: BTreeMap<Resource, ResourceRecord>,

    /// Next resource id to hand out.
    next_resource_id: u64,

    /// Direct permissions: (accessor, target) -> rows.
    permissions: BTreeMap<(Resource, PermissionTarget), Vec<PermissionRow>>,
}

struct StoredClass {
    info: ResourceClassInfo,
    permission_names: Vec<String>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn class(&self, name: &str) -> Result<&StoredClass> {
        self.classes
            .get(&class_key(name))
            .ok_or_else(|| StoreError::NotFound(format!("resource class {}", name.trim())))
    }

    fn insert_resource(
        &mut self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
    ) -> Result<Resource> {
        let class_name = self.class(class)?.info.name.clone();
        if !self.domains.contains(domain) {
            return Err(StoreError::NotFound(format!("domain {}", domain)));
        }

        let resource = Resource::from_id(self.next_resource_id);
        self.next_resource_id += 1;
        self.resources.insert(
            resource,
            ResourceRecord {
                resource,
                class: class_name,
                domain: domain.to_string(),
                credential: credential.map(str::to_string),
            },
        );
        Ok(resource)
    }

    fn replace_rows(
        &mut self,
        accessor: Resource,
        target: PermissionTarget,
        rows: &[PermissionRow],
    ) {
        let key = (accessor, target);
        if rows.is_empty() {
            self.permissions.remove(&key);
        } else {
            self.permissions.insert(key, rows.to_vec());
        }
    }

    fn drop_permissions_for(&mut self, resource: Resource) {
        self.permissions.retain(|(accessor, target), _| {
            *accessor != resource && *target != PermissionTarget::Resource(resource)
        });
    }
}

impl Store for MemoryStore {
    fn create_domain(&self, name: &str, parent: Option<&str>) -> Result<()> {
        let mut inner = self.write()?;
        inner.domains.insert(name, parent)
    }

    fn create_domain_with_permissions(
        &self,
        name: &str,
        parent: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.domains.insert(name, parent)?;
        inner.replace_rows(creator, PermissionTarget::Domain(name.to_string()), rows);
        Ok(())
    }

    fn domain(&self, name: &str) -> Result<Option<DomainRecord>> {
        let inner = self.read()?;
        Ok(inner.domains.get(name))
    }

    fn domain_names(&self) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner.domains.names())
    }

    fn domain_ancestors(&self, name: &str) -> Result<Vec<String>> {
        let inner = self.read()?;
        inner.domains.ancestors(name)
    }

    fn domain_descendants(&self, name: &str) -> Result<BTreeSet<String>> {
        let inner = self.read()?;
        inner.domains.descendants(name)
    }

    fn create_resource_class(&self, info: &ResourceClassInfo) -> Result<()> {
        let mut inner = self.write()?;
        let key = class_key(&info.name);
        if inner.classes.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("resource class {}", info.name)));
        }
        inner.classes.insert(
            key,
            StoredClass {
                info: info.clone(),
                permission_names: Vec::new(),
            },
        );
        Ok(())
    }

    fn resource_class(&self, name: &str) -> Result<Option<ResourceClassInfo>> {
        let inner = self.read()?;
        Ok(inner.classes.get(&class_key(name)).map(|c| c.info.clone()))
    }

    fn resource_class_names(&self) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner.classes.values().map(|c| c.info.name.clone()).collect())
    }

    fn create_resource_permission(&self, class: &str, permission: &str) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .classes
            .get_mut(&class_key(class))
            .ok_or_else(|| StoreError::NotFound(format!("resource class {}", class.trim())))?;
        if stored.permission_names.iter().any(|p| p == permission) {
            return Err(StoreError::AlreadyExists(format!(
                "permission {} for class {}",
                permission, stored.info.name
            )));
        }
        stored.permission_names.push(permission.to_string());
        Ok(())
    }

    fn resource_permission_names(&self, class: &str) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner.class(class)?.permission_names.clone())
    }

    fn create_resource(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
    ) -> Result<Resource> {
        let mut inner = self.write()?;
        inner.insert_resource(class, domain, credential)
    }

    fn create_resource_with_permissions(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<Resource> {
        let mut inner = self.write()?;
        let resource = inner.insert_resource(class, domain, credential)?;
        inner.replace_rows(creator, PermissionTarget::Resource(resource), rows);
        Ok(resource)
    }

    fn resource(&self, resource: Resource) -> Result<Option<ResourceRecord>> {
        let inner = self.read()?;
        Ok(inner.resources.get(&resource).cloned())
    }

    fn resources_of_class(&self, class: &str) -> Result<Vec<Resource>> {
        let inner = self.read()?;
        let key = class_key(class);
        Ok(inner
            .resources
            .values()
            .filter(|record| class_key(&record.class) == key)
            .map(|record| record.resource)
            .collect())
    }

    fn all_resources(&self) -> Result<Vec<Resource>> {
        let inner = self.read()?;
        Ok(inner.resources.keys().copied().collect())
    }

    fn set_credential(&self, resource: Resource, credential: Option<&str>) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner
            .resources
            .get_mut(&resource)
            .ok_or_else(|| StoreError::NotFound(format!("resource {}", resource)))?;
        record.credential = credential.map(str::to_string);
        Ok(())
    }

    fn delete_resource(&self, resource: Resource) -> Result<()> {
        let mut inner = self.write()?;
        if inner.resources.remove(&resource).is_none() {
            return Err(StoreError::NotFound(format!("resource {}", resource)));
        }
        inner.drop_permissions_for(resource);
        Ok(())
    }

    fn direct_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
    ) -> Result<Vec<PermissionRow>> {
        let inner = self.read()?;
        Ok(inner
            .permissions
            .get(&(accessor, target.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn put_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
        rows: &[PermissionRow],
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner.replace_rows(accessor, target.clone(), rows);
        Ok(())
    }

    fn permission_targets(
        &self,
        accessor: Resource,
        kind: PermissionKind,
    ) -> Result<Vec<PermissionTarget>> {
        let inner = self.read()?;
        Ok(inner
            .permissions
            .keys()
            .filter(|(a, target)| *a == accessor && target.kind() == kind)
            .map(|(_, target)| target.clone())
            .collect())
    }

    fn delete_permissions_for_resource(&self, resource: Resource) -> Result<()> {
        let mut inner = self.write()?;
        inner.drop_permissions_for(resource);
        Ok(())
    }
}
