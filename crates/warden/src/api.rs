//! The two capability surfaces of a context.
//!
//! [`AccessControl`] covers the session and every read: permission checks,
//! direct and effective getters, lookups. [`AccessAdministration`] covers
//! every write. Code that should only ever check permissions can be handed
//! a `&dyn AccessControl`.

use std::collections::{BTreeMap, BTreeSet};

use warden_core::{
    DomainCreatePermission, DomainPermission, Password, PermissionSet, Resource,
    ResourceClassInfo, ResourceCreatePermission, ResourcePermission,
};

use crate::error::Result;

/// Domain name to permissions held on it.
pub type DomainPermissionsMap = BTreeMap<String, PermissionSet<DomainPermission>>;

/// Domain name, then class name, to permissions.
pub type ClassPermissionsMap<P> = BTreeMap<String, BTreeMap<String, PermissionSet<P>>>;

/// Session handling, permission checks and read-only lookups.
///
/// Every check runs as the session resource. Asking about an accessor other
/// than the session resource needs `*QUERY` on that accessor. `assert_*` and
/// `get_*` fail with `NotAuthorized` when that is missing, `has_*` returns
/// `false`.
pub trait AccessControl {
    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify credentials and become `resource`.
    fn authenticate(&mut self, resource: Resource, password: &Password) -> Result<()>;

    fn unauthenticate(&mut self) -> Result<()>;

    /// Act as `resource`. Needs `*IMPERSONATE` on it.
    fn impersonate(&mut self, resource: Resource) -> Result<()>;

    fn unimpersonate(&mut self) -> Result<()>;

    /// The resource whose credentials were checked.
    fn authenticated_resource(&self) -> Result<Resource>;

    /// The resource every check runs as.
    fn session_resource(&self) -> Result<Resource>;

    // ─────────────────────────────────────────────────────────────────────────
    // Domain Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<bool>;

    fn assert_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<()>;

    fn get_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
    ) -> Result<PermissionSet<DomainPermission>>;

    fn get_domain_permissions_map(&self, accessor: Resource) -> Result<DomainPermissionsMap>;

    fn get_effective_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
    ) -> Result<PermissionSet<DomainPermission>>;

    fn get_effective_domain_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<DomainPermissionsMap>;

    // ─────────────────────────────────────────────────────────────────────────
    // Domain-Create Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_domain_create_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainCreatePermission>,
    ) -> Result<bool>;

    fn assert_domain_create_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainCreatePermission>,
    ) -> Result<()>;

    /// Whether `accessor` would hold `required` on a domain it creates.
    fn has_post_create_domain_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<bool>;

    fn assert_post_create_domain_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<()>;

    fn get_domain_create_permissions(
        &self,
        accessor: Resource,
    ) -> Result<PermissionSet<DomainCreatePermission>>;

    fn get_effective_domain_create_permissions(
        &self,
        accessor: Resource,
    ) -> Result<PermissionSet<DomainCreatePermission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool>;

    fn assert_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<()>;

    fn get_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
    ) -> Result<PermissionSet<ResourcePermission>>;

    fn get_effective_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
    ) -> Result<PermissionSet<ResourcePermission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Global Resource Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool>;

    fn assert_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<()>;

    fn get_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourcePermission>>;

    fn get_global_resource_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourcePermission>>;

    fn get_effective_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourcePermission>>;

    fn get_effective_global_resource_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourcePermission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resource-Create Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<bool>;

    fn assert_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<()>;

    /// Whether `accessor` would hold `required` on a resource of `class` it
    /// creates in `domain`.
    fn has_post_create_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool>;

    fn assert_post_create_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<()>;

    fn get_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourceCreatePermission>>;

    fn get_resource_create_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourceCreatePermission>>;

    fn get_effective_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourceCreatePermission>>;

    fn get_effective_resource_create_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourceCreatePermission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    fn get_domain_name_by_resource(&self, resource: Resource) -> Result<String>;

    /// The domain and every domain below it.
    fn get_domain_descendants(&self, domain: &str) -> Result<BTreeSet<String>>;

    fn get_resource_class_info(&self, class: &str) -> Result<ResourceClassInfo>;

    fn get_resource_class_info_by_resource(&self, resource: Resource) -> Result<ResourceClassInfo>;

    fn get_resource_class_names(&self) -> Result<Vec<String>>;

    /// Custom permission names registered for `class`.
    fn get_resource_permission_names(&self, class: &str) -> Result<Vec<String>>;

    /// Resources of `class` on which `accessor` effectively holds
    /// `permission`, optionally limited to `domain` and its descendants.
    fn get_resources_by_resource_permission(
        &self,
        accessor: Resource,
        class: &str,
        permission: &ResourcePermission,
        domain: Option<&str>,
    ) -> Result<Vec<Resource>>;

    /// Resources of `class` that effectively hold `permission` on `accessed`.
    fn get_accessor_resources_by_resource_permission(
        &self,
        accessed: Resource,
        class: &str,
        permission: &ResourcePermission,
    ) -> Result<Vec<Resource>>;
}

/// Creation, deletion and permission assignment.
///
/// Every `set_*` call replaces the direct permissions of one
/// (accessor, target) pair. The session needs grant authority over each entry
/// that changes. Nothing is written if any entry is invalid or unauthorized.
pub trait AccessAdministration {
    /// Register a resource class. System resource only.
    fn create_resource_class(
        &self,
        name: &str,
        authenticatable: bool,
        unauthenticated_create_allowed: bool,
    ) -> Result<()>;

    /// Register a custom permission name for a class. System resource only.
    fn create_resource_permission(&self, class: &str, permission: &str) -> Result<()>;

    /// Create a domain, optionally under `parent`.
    fn create_domain(&self, name: &str, parent: Option<&str>) -> Result<()>;

    /// Create a resource. Authenticatable classes need a password, others
    /// must not get one.
    fn create_resource(
        &self,
        class: &str,
        domain: &str,
        password: Option<&Password>,
    ) -> Result<Resource>;

    /// Replace the credentials of an authenticatable resource.
    fn set_credentials(&self, resource: Resource, password: &Password) -> Result<()>;

    /// Delete a resource and every permission that mentions it.
    fn delete_resource(&self, resource: Resource) -> Result<()>;

    fn set_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
        permissions: &PermissionSet<DomainPermission>,
    ) -> Result<()>;

    fn set_domain_create_permissions(
        &self,
        accessor: Resource,
        permissions: &PermissionSet<DomainCreatePermission>,
    ) -> Result<()>;

    fn set_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
        permissions: &PermissionSet<ResourcePermission>,
    ) -> Result<()>;

    fn set_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        permissions: &PermissionSet<ResourcePermission>,
    ) -> Result<()>;

    fn set_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        permissions: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<()>;
}
