//! A store wrapper that can be told to fail permission writes.
//!
//! Every call is forwarded to the wrapped store. While armed, any operation
//! that writes permission rows fails with [`StoreError::InvalidData`] before
//! touching the inner store. Entity-only writes (`create_domain`,
//! `create_resource`) keep working, so a caller that splits creation from
//! the creator's grant leaves an orphan behind.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use warden_core::{PermissionRow, Resource, ResourceClassInfo};
use warden_store::{
    DomainRecord, PermissionKind, PermissionTarget, ResourceRecord, Result, Store, StoreError,
};

pub struct FaultyStore<S: Store> {
    inner: S,
    failing: AtomicBool,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    /// Start or stop failing permission writes.
    pub fn fail_permission_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidData(format!("injected failure in {}", operation)));
        }
        Ok(())
    }
}

impl<S: Store> Store for FaultyStore<S> {
    fn create_domain(&self, name: &str, parent: Option<&str>) -> Result<()> {
        self.inner.create_domain(name, parent)
    }

    fn create_domain_with_permissions(
        &self,
        name: &str,
        parent: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<()> {
        self.check("create_domain_with_permissions")?;
        self.inner
            .create_domain_with_permissions(name, parent, creator, rows)
    }

    fn domain(&self, name: &str) -> Result<Option<DomainRecord>> {
        self.inner.domain(name)
    }

    fn domain_names(&self) -> Result<Vec<String>> {
        self.inner.domain_names()
    }

    fn domain_ancestors(&self, name: &str) -> Result<Vec<String>> {
        self.inner.domain_ancestors(name)
    }

    fn domain_descendants(&self, name: &str) -> Result<BTreeSet<String>> {
        self.inner.domain_descendants(name)
    }

    fn create_resource_class(&self, info: &ResourceClassInfo) -> Result<()> {
        self.inner.create_resource_class(info)
    }

    fn resource_class(&self, name: &str) -> Result<Option<ResourceClassInfo>> {
        self.inner.resource_class(name)
    }

    fn resource_class_names(&self) -> Result<Vec<String>> {
        self.inner.resource_class_names()
    }

    fn create_resource_permission(&self, class: &str, permission: &str) -> Result<()> {
        self.inner.create_resource_permission(class, permission)
    }

    fn resource_permission_names(&self, class: &str) -> Result<Vec<String>> {
        self.inner.resource_permission_names(class)
    }

    fn create_resource(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
    ) -> Result<Resource> {
        self.inner.create_resource(class, domain, credential)
    }

    fn create_resource_with_permissions(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<Resource> {
        self.check("create_resource_with_permissions")?;
        self.inner
            .create_resource_with_permissions(class, domain, credential, creator, rows)
    }

    fn resource(&self, resource: Resource) -> Result<Option<ResourceRecord>> {
        self.inner.resource(resource)
    }

    fn resources_of_class(&self, class: &str) -> Result<Vec<Resource>> {
        self.inner.resources_of_class(class)
    }

    fn all_resources(&self) -> Result<Vec<Resource>> {
        self.inner.all_resources()
    }

    fn set_credential(&self, resource: Resource, credential: Option<&str>) -> Result<()> {
        self.inner.set_credential(resource, credential)
    }

    fn delete_resource(&self, resource: Resource) -> Result<()> {
        self.inner.delete_resource(resource)
    }

    fn direct_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
    ) -> Result<Vec<PermissionRow>> {
        self.inner.direct_permissions(accessor, target)
    }

    fn put_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
        rows: &[PermissionRow],
    ) -> Result<()> {
        self.check("put_permissions")?;
        self.inner.put_permissions(accessor, target, rows)
    }

    fn permission_targets(
        &self,
        accessor: Resource,
        kind: PermissionKind,
    ) -> Result<Vec<PermissionTarget>> {
        self.inner.permission_targets(accessor, kind)
    }

    fn delete_permissions_for_resource(&self, resource: Resource) -> Result<()> {
        self.check("delete_permissions_for_resource")?;
        self.inner.delete_permissions_for_resource(resource)
    }
}
