//! Identity types.
//!
//! Identifiers are newtypes so a resource handle can never be confused with a
//! plain integer at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of an individually authorizable entity.
///
/// The handle carries only the identifier. The owning class and domain live
/// in the repository and are looked up when needed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resource(u64);

impl Resource {
    /// The distinguished system resource. It bypasses every grant check.
    pub const SYSTEM: Self = Self(0);

    /// Create a handle from a raw identifier.
    pub const fn from_id(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw identifier.
    pub const fn id(&self) -> u64 {
        self.0
    }

    /// Whether this is the system resource.
    pub const fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM.0
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource({})", self.0)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Resource {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Description of a resource class.
///
/// Immutable once created. The name keeps the caller's spelling but is
/// compared case-insensitively after trimming (see [`crate::class_key`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceClassInfo {
    /// Display name of the class.
    pub name: String,

    /// Whether instances can log in.
    pub authenticatable: bool,

    /// Whether instances may be created without an authenticated session.
    pub unauthenticated_create_allowed: bool,
}

impl ResourceClassInfo {
    /// Create a class description.
    pub fn new(
        name: impl Into<String>,
        authenticatable: bool,
        unauthenticated_create_allowed: bool,
    ) -> Self {
        Self {
            name: name.into(),
            authenticatable,
            unauthenticated_create_allowed,
        }
    }
}
