//! # Warden Store
//!
//! Storage abstraction for Warden. Provides a trait-based interface for
//! domains, resource classes, resources and directly assigned permissions,
//! with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts persistence behind the [`Store`] trait so the resolver
//! and the authorization gate are storage-agnostic. The store only knows
//! about *direct* assignments. Inheritance and super-user absorption are
//! computed above it, in `warden-perms`.
//!
//! ## Key Types
//!
//! - [`Store`] - The trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests and embedding
//! - [`DomainForest`] - Parent-pointer index with memoized descendant sets
//! - [`PermissionTarget`] - What a set of direct permissions is assigned on
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_store::{PermissionTarget, SqliteStore, Store};
//! use warden_core::{Permission, ResourcePermission};
//!
//! let store = SqliteStore::open("warden.db").unwrap();
//! store.create_domain("root", None).unwrap();
//!
//! let accessor = warden_core::Resource::from_id(1);
//! let view = ResourcePermission::new("view").unwrap();
//! let target = PermissionTarget::Domain("root".into());
//! store.put_permissions(accessor, &target, &[view.to_row()]).unwrap();
//! ```
//!
//! ## Design Notes
//!
//! - **Full replace**: `put_permissions` replaces every row of the
//!   (accessor, target) pair atomically. An empty slice revokes everything.
//! - **Cascading deletes**: deleting a resource removes every permission in
//!   which it is the accessor or the accessed resource, in one transaction.
//! - **Stable ids**: resource ids are allocated from a counter starting at 0
//!   and are never reused.

pub mod error;
pub mod hierarchy;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use hierarchy::DomainForest;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DomainRecord, PermissionKind, PermissionTarget, ResourceRecord, Store, StoreExt};
