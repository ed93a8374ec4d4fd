//! # Warden Permissions
//!
//! Effective-permission resolution.
//!
//! ## Overview
//!
//! The store only knows what was assigned directly. This crate computes what
//! an accessor *effectively* holds on a target by folding together every
//! permission source:
//!
//! 1. Direct assignments on the target
//! 2. Assignments on every ancestor domain of the target's domain
//! 3. Global (class-wide) assignments for resource targets
//! 4. Everything held by resources the accessor inherits from via `*INHERIT`
//! 5. Super-user absorption: `*SUPER-USER` on the owning domain yields every
//!    applicable permission, with grant
//!
//! Grant is monotonic during the fold. If any path grants a permission with
//! grant authority, the effective entry carries it.
//!
//! ## Key Types
//!
//! - [`Resolver`] - Pure function of (accessor, target, store snapshot)
//! - [`EffectivePermissions`] - Folded set plus absorption and provenance
//! - [`PermissionSource`] - Where a contribution came from
//! - [`unauthorized_changes`] - Grant-authority check on a requested change
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_perms::Resolver;
//! use warden_store::MemoryStore;
//! use warden_core::{DomainPermission, Resource};
//!
//! let store = MemoryStore::new();
//! let resolver = Resolver::new(&store);
//! let effective = resolver
//!     .domain_permissions(Resource::from_id(1), "root/sales")
//!     .unwrap();
//! let holds_view = effective.has(&DomainPermission::new("view").unwrap());
//! ```

pub mod authority;
pub mod effective;
pub mod error;
pub mod resolver;

pub use authority::unauthorized_changes;
pub use effective::{EffectivePermissions, PermissionSource};
pub use error::{PermsError, Result};
pub use resolver::Resolver;
