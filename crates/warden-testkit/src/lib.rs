//! # Warden Testkit
//!
//! Testing utilities for Warden.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an installed store with an authenticated system context
//!   and helpers for uniquely named domains, classes and resources
//! - **Generators**: Proptest strategies for padded names and permission sets
//! - **Golden vectors**: known stored credentials that must keep verifying
//! - **Fault injection**: a store wrapper whose permission writes can be
//!   made to fail
//!
//! The integration suites for the whole workspace live in this crate's
//! `tests/` directory.
//!
//! ## Test Fixtures
//!
//! ```rust
//! use warden::{AccessAdministration, AccessControl};
//! use warden_testkit::fixtures::{rp, set, TestFixture};
//!
//! let fixture = TestFixture::new();
//! let domain = fixture.domain();
//! let class = fixture.class(false, &["view"]);
//! let account = fixture.resource(&class, &domain);
//! let alice = fixture.user(&domain);
//!
//! fixture.admin().set_resource_permissions(alice, account, &set([rp("view")])).unwrap();
//! let alice_session = fixture.login(alice);
//! assert!(alice_session.has_resource_permissions(alice, account, &set([rp("view")])).unwrap());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use warden_testkit::generators::domain_permission_set;
//!
//! proptest! {
//!     #[test]
//!     fn replace_is_exact(set in domain_permission_set()) {
//!         // set, then read back
//!     }
//! }
//! ```

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fast_config, unique_name, TestFixture, SYSTEM_PASSWORD, USER_PASSWORD};
pub use generators::{
    domain_create_permission_set, domain_permission_set, padded, resource_create_permission_set,
    resource_permission_set,
};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
