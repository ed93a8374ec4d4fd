//! # Warden Core
//!
//! Pure value types for the Warden authorization engine: resources, resource
//! classes, and the four permission kinds.
//!
//! This crate contains no I/O, no storage and no locking. Everything here is
//! an immutable, set-comparable value.
//!
//! ## Key Types
//!
//! - [`Resource`] - Opaque handle of an individually authorizable entity
//! - [`ResourceClassInfo`] - Type of a resource (authenticatable, etc.)
//! - [`DomainPermission`] - Permission held on a domain
//! - [`ResourcePermission`] - Permission held on a resource (or globally on a class)
//! - [`DomainCreatePermission`] / [`ResourceCreatePermission`] - What may be
//!   created, and what the creator receives afterwards
//! - [`PermissionSet`] - A set of permissions, unique by normalized name
//!
//! ## Names
//!
//! All names are trimmed before comparison. Names starting with `*` are
//! reserved for system permissions and must match a known system name
//! exactly. How custom names compare is governed by [`NameMatching`].

pub mod create;
pub mod error;
pub mod password;
pub mod permission;
pub mod set;
pub mod types;
pub mod validation;

pub use create::{CreateEntry, CreatePermission, DomainCreatePermission, ResourceCreatePermission};
pub use error::ValidationError;
pub use password::{Password, MAX_PASSWORD_LENGTH};
pub use permission::{DomainPermission, NameMatching, Permission, PermissionRow, ResourcePermission};
pub use set::PermissionSet;
pub use types::{Resource, ResourceClassInfo};
pub use validation::{
    canonical_domain_permission, canonical_resource_permission, class_key, normalize_name,
    validate_domain_create_permissions, validate_resource_create_permissions,
};
