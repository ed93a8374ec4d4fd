//! # Warden
//!
//! A hierarchical authorization engine: resources live in domains, belong to
//! resource classes, and hold permissions on domains, on other resources,
//! globally on a class within a domain, and on what they may create.
//!
//! ## Overview
//!
//! - **Domains** form a forest. Permissions held on a domain apply to every
//!   domain below it.
//! - **Resources** are typed by a class and located in one domain. Resources
//!   of authenticatable classes carry credentials and can log in.
//! - **Effective permissions** combine direct assignments, ancestor domains,
//!   global class permissions and `*INHERIT` chains. `*SUPER-USER` on a domain
//!   means holding everything there, with grant.
//! - **Grant authority**: assigning or revoking a permission requires holding
//!   it with grant.
//!
//! ## Usage
//!
//! ```rust
//! use warden::{AccessAdministration, AccessControl, ContextConfig, Warden};
//! use warden::auth::DigestParams;
//! use warden::config::EncryptorChoice;
//! use warden::core::{Password, PermissionSet, ResourcePermission};
//! use warden::store::MemoryStore;
//!
//! # fn main() -> warden::Result<()> {
//! let config = ContextConfig {
//!     encryptor: EncryptorChoice::Digest(DigestParams { iterations: 10, ..Default::default() }),
//!     ..ContextConfig::default()
//! };
//! let warden = Warden::new(MemoryStore::new(), config);
//! let admin = warden.install_authenticated(&Password::new("change me")?)?;
//! admin.create_resource_class("Account", false, false)?;
//! admin.create_resource_permission("Account", "view")?;
//! admin.create_resource_class("User", true, false)?;
//! admin.create_domain("root", None)?;
//!
//! let account = admin.create_resource("Account", "root", None)?;
//! let alice = admin.create_resource("User", "root", Some(&Password::new("secret")?))?;
//! let view: PermissionSet<_> = [ResourcePermission::new("view")?].into_iter().collect();
//! admin.set_resource_permissions(alice, account, &view)?;
//!
//! let mut session = warden.context();
//! session.authenticate(alice, &Password::new("secret")?)?;
//! assert!(session.has_resource_permissions(alice, account, &view)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `warden::core` - Permission values, sets and validation
//! - `warden::store` - Storage abstraction, in-memory and SQLite stores
//! - `warden::perms` - Effective-permission resolution
//! - `warden::auth` - Credential encoders and the session state machine
//!
//! ## Design Notes
//!
//! Callers share one [`Warden`] and each take their own
//! [`AccessControlContext`]. Read access goes through [`AccessControl`],
//! writes through [`AccessAdministration`]. Permission replacements on the
//! same (accessor, target) pair are serialized in-process.

pub mod admin;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod locks;

// Re-export component crates
pub use warden_auth as auth;
pub use warden_core as core;
pub use warden_perms as perms;
pub use warden_store as store;

// Re-export main types for convenience
pub use api::{AccessAdministration, AccessControl, ClassPermissionsMap, DomainPermissionsMap};
pub use bootstrap::install;
pub use config::{ContextConfig, EncryptorChoice};
pub use context::{AccessControlContext, Warden};
pub use error::{AccessError, ErrorKind, Result};
pub use locks::PairLocks;

// Re-export commonly used core types
pub use warden_core::{
    DomainCreatePermission, DomainPermission, Password, PermissionSet, Resource,
    ResourceClassInfo, ResourceCreatePermission, ResourcePermission,
};
