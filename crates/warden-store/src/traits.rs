//! Store trait: the abstract interface for authorization data.
//!
//! This trait allows the engine to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::{PermissionRow, Resource, ResourceClassInfo};

use crate::error::{Result, StoreError};

/// A stored domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub name: String,
    pub parent: Option<String>,
}

/// A stored resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource: Resource,
    /// Registered name of the owning class.
    pub class: String,
    /// Name of the owning domain.
    pub domain: String,
    /// Encoded credential, only for authenticatable classes.
    pub credential: Option<String>,
}

/// The kind of permission stored for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionKind {
    Domain,
    DomainCreate,
    Resource,
    Global,
    ResourceCreate,
}

impl PermissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::Domain => "domain",
            PermissionKind::DomainCreate => "domain_create",
            PermissionKind::Resource => "resource",
            PermissionKind::Global => "global",
            PermissionKind::ResourceCreate => "resource_create",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "domain" => Some(PermissionKind::Domain),
            "domain_create" => Some(PermissionKind::DomainCreate),
            "resource" => Some(PermissionKind::Resource),
            "global" => Some(PermissionKind::Global),
            "resource_create" => Some(PermissionKind::ResourceCreate),
            _ => None,
        }
    }
}

/// What a set of direct permissions is assigned on.
///
/// Class names are the registered spelling, domain names the stored name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionTarget {
    /// Domain permissions on a domain.
    Domain(String),
    /// Domain-create permissions. They belong to the accessor alone.
    DomainCreate,
    /// Resource permissions on one resource.
    Resource(Resource),
    /// Resource permissions on every resource of a class in a domain.
    Global { class: String, domain: String },
    /// Resource-create permissions for a class in a domain.
    ResourceCreate { class: String, domain: String },
}

impl PermissionTarget {
    pub fn kind(&self) -> PermissionKind {
        match self {
            PermissionTarget::Domain(_) => PermissionKind::Domain,
            PermissionTarget::DomainCreate => PermissionKind::DomainCreate,
            PermissionTarget::Resource(_) => PermissionKind::Resource,
            PermissionTarget::Global { .. } => PermissionKind::Global,
            PermissionTarget::ResourceCreate { .. } => PermissionKind::ResourceCreate,
        }
    }

    /// Unique key of the target within its kind.
    pub fn storage_key(&self) -> String {
        match self {
            PermissionTarget::Domain(domain) => domain.clone(),
            PermissionTarget::DomainCreate => String::new(),
            PermissionTarget::Resource(resource) => resource.id().to_string(),
            PermissionTarget::Global { class, domain }
            | PermissionTarget::ResourceCreate { class, domain } => {
                format!("{}\u{1f}{}", class, domain)
            }
        }
    }

    /// The domain the target lives in, when it names one.
    pub fn domain(&self) -> Option<&str> {
        match self {
            PermissionTarget::Domain(domain)
            | PermissionTarget::Global { domain, .. }
            | PermissionTarget::ResourceCreate { domain, .. } => Some(domain),
            PermissionTarget::DomainCreate | PermissionTarget::Resource(_) => None,
        }
    }
}

impl fmt::Display for PermissionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionTarget::Domain(domain) => write!(f, "domain {}", domain),
            PermissionTarget::DomainCreate => write!(f, "domain-create"),
            PermissionTarget::Resource(resource) => write!(f, "resource {}", resource),
            PermissionTarget::Global { class, domain } => {
                write!(f, "global {} in {}", class, domain)
            }
            PermissionTarget::ResourceCreate { class, domain } => {
                write!(f, "create {} in {}", class, domain)
            }
        }
    }
}

/// The Store trait: synchronous interface for authorization data.
///
/// Every method is atomic on its own. Multi-row writes (`put_permissions`,
/// `delete_resource`) either apply completely or not at all.
///
/// # Design Notes
///
/// - **Direct only**: the store never resolves inheritance.
/// - **Forest by construction**: a domain can only be created under an
///   existing domain, so cycles cannot arise.
/// - **Case**: class names are looked up case-insensitively after trimming,
///   domain and permission names are stored as given.
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Domain Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a domain, optionally under an existing parent.
    fn create_domain(&self, name: &str, parent: Option<&str>) -> Result<()>;

    /// Create a domain and give `creator` the `rows` on it in the same
    /// write. Nothing is stored when either part fails.
    fn create_domain_with_permissions(
        &self,
        name: &str,
        parent: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<()>;

    /// Get a domain by name.
    fn domain(&self, name: &str) -> Result<Option<DomainRecord>>;

    /// List all domain names.
    fn domain_names(&self) -> Result<Vec<String>>;

    /// Ordered chain from the domain itself up to its root.
    fn domain_ancestors(&self, name: &str) -> Result<Vec<String>>;

    /// The domain and every domain below it.
    fn domain_descendants(&self, name: &str) -> Result<BTreeSet<String>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Class Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a resource class.
    fn create_resource_class(&self, info: &ResourceClassInfo) -> Result<()>;

    /// Look up a class by name, ignoring case and surrounding whitespace.
    fn resource_class(&self, name: &str) -> Result<Option<ResourceClassInfo>>;

    /// Registered names of all classes.
    fn resource_class_names(&self) -> Result<Vec<String>>;

    /// Register a custom permission name for a class.
    fn create_resource_permission(&self, class: &str, permission: &str) -> Result<()>;

    /// Custom permission names registered for a class.
    fn resource_permission_names(&self, class: &str) -> Result<Vec<String>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a resource and return its newly allocated handle.
    fn create_resource(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
    ) -> Result<Resource>;

    /// Create a resource and give `creator` the `rows` on it in the same
    /// write. Nothing is stored, and no id is used up, when either part fails.
    fn create_resource_with_permissions(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<Resource>;

    /// Get a resource by handle.
    fn resource(&self, resource: Resource) -> Result<Option<ResourceRecord>>;

    /// All resources of a class, in id order.
    fn resources_of_class(&self, class: &str) -> Result<Vec<Resource>>;

    /// Every resource, in id order.
    fn all_resources(&self) -> Result<Vec<Resource>>;

    /// Replace a resource's credential record.
    fn set_credential(&self, resource: Resource, credential: Option<&str>) -> Result<()>;

    /// Delete a resource and every permission that mentions it.
    fn delete_resource(&self, resource: Resource) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Directly assigned permissions of `accessor` on `target`.
    fn direct_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
    ) -> Result<Vec<PermissionRow>>;

    /// Replace every permission of `accessor` on `target` with `rows`.
    fn put_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
        rows: &[PermissionRow],
    ) -> Result<()>;

    /// Targets of the given kind on which `accessor` holds any direct permission.
    fn permission_targets(
        &self,
        accessor: Resource,
        kind: PermissionKind,
    ) -> Result<Vec<PermissionTarget>>;

    /// Remove every permission in which `resource` is accessor or target.
    fn delete_permissions_for_resource(&self, resource: Resource) -> Result<()>;
}

/// Extension trait for lookups that must succeed.
pub trait StoreExt: Store {
    /// Get a domain or fail with `NotFound`.
    fn require_domain(&self, name: &str) -> Result<DomainRecord> {
        self.domain(name)?
            .ok_or_else(|| StoreError::NotFound(format!("domain {}", name)))
    }

    /// Get a class or fail with `NotFound`.
    fn require_resource_class(&self, name: &str) -> Result<ResourceClassInfo> {
        self.resource_class(name)?
            .ok_or_else(|| StoreError::NotFound(format!("resource class {}", name.trim())))
    }

    /// Get a resource or fail with `NotFound`.
    fn require_resource(&self, resource: Resource) -> Result<ResourceRecord> {
        self.resource(resource)?
            .ok_or_else(|| StoreError::NotFound(format!("resource {}", resource)))
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
