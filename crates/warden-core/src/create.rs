//! Create permissions.
//!
//! A create permission either authorizes the create action itself (the
//! reserved `*CREATE` entry) or names a permission the creator receives on the
//! newly created entity (a post-create entry). Each carries its own grant flag
//! for the create action, independent of the post-create permission's flag.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::permission::{DomainPermission, Permission, PermissionRow, ResourcePermission};

/// What a create permission refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreateEntry<P> {
    /// The `*CREATE` marker.
    Create,
    /// A permission the creator receives on the new entity.
    PostCreate(P),
}

/// A create permission over post-create permissions of type `P`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreatePermission<P> {
    entry: CreateEntry<P>,
    with_grant: bool,
}

/// Create permission for domains.
pub type DomainCreatePermission = CreatePermission<DomainPermission>;

/// Create permission for resources of a class within a domain.
pub type ResourceCreatePermission = CreatePermission<ResourcePermission>;

impl<P: Permission> CreatePermission<P> {
    /// Name of the mandatory create marker.
    pub const CREATE: &'static str = "*CREATE";

    pub fn new(entry: CreateEntry<P>, with_grant: bool) -> Self {
        Self { entry, with_grant }
    }

    /// The `*CREATE` marker without grant authority.
    pub fn create() -> Self {
        Self::new(CreateEntry::Create, false)
    }

    /// The `*CREATE` marker with grant authority.
    pub fn create_with_grant() -> Self {
        Self::new(CreateEntry::Create, true)
    }

    /// A post-create entry without grant authority on the create action.
    pub fn post_create(permission: P) -> Self {
        Self::new(CreateEntry::PostCreate(permission), false)
    }

    /// A post-create entry with grant authority on the create action.
    pub fn post_create_with_grant(permission: P) -> Self {
        Self::new(CreateEntry::PostCreate(permission), true)
    }

    pub fn entry(&self) -> &CreateEntry<P> {
        &self.entry
    }

    /// The post-create permission, if this is not the marker.
    pub fn post_create_permission(&self) -> Option<&P> {
        match &self.entry {
            CreateEntry::Create => None,
            CreateEntry::PostCreate(permission) => Some(permission),
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self.entry, CreateEntry::Create)
    }

    pub fn is_with_grant(&self) -> bool {
        self.with_grant
    }
}

impl<P: Permission> Permission for CreatePermission<P> {
    fn key(&self) -> &str {
        match &self.entry {
            CreateEntry::Create => Self::CREATE,
            CreateEntry::PostCreate(permission) => permission.key(),
        }
    }

    fn is_satisfied_by(&self, held: &Self) -> bool {
        if self.with_grant && !held.with_grant {
            return false;
        }
        match (&self.entry, &held.entry) {
            (CreateEntry::Create, CreateEntry::Create) => true,
            (CreateEntry::PostCreate(required), CreateEntry::PostCreate(held)) => {
                required.is_satisfied_by(held)
            }
            _ => false,
        }
    }

    fn is_grantable_from(&self, held: &Self) -> bool {
        if !held.with_grant {
            return false;
        }
        match (&self.entry, &held.entry) {
            (CreateEntry::Create, CreateEntry::Create) => true,
            (CreateEntry::PostCreate(requested), CreateEntry::PostCreate(held)) => {
                requested.is_satisfied_by(held)
            }
            _ => false,
        }
    }

    fn merge(&mut self, other: &Self) {
        self.with_grant |= other.with_grant;
        if let (CreateEntry::PostCreate(mine), CreateEntry::PostCreate(theirs)) =
            (&mut self.entry, &other.entry)
        {
            mine.merge(theirs);
        }
    }

    fn with_all_grants(&self) -> Self {
        let entry = match &self.entry {
            CreateEntry::Create => CreateEntry::Create,
            CreateEntry::PostCreate(permission) => {
                CreateEntry::PostCreate(permission.with_all_grants())
            }
        };
        Self {
            entry,
            with_grant: true,
        }
    }

    fn to_row(&self) -> PermissionRow {
        match &self.entry {
            CreateEntry::Create => PermissionRow {
                name: Self::CREATE.to_string(),
                with_grant: false,
                create_with_grant: Some(self.with_grant),
            },
            CreateEntry::PostCreate(permission) => {
                let inner = permission.to_row();
                PermissionRow {
                    name: inner.name,
                    with_grant: inner.with_grant,
                    create_with_grant: Some(self.with_grant),
                }
            }
        }
    }

    fn from_row(row: &PermissionRow) -> Result<Self, ValidationError> {
        let with_grant = row.create_with_grant.ok_or_else(|| {
            ValidationError::MalformedRow(format!("{} lacks a create grant flag", row.name))
        })?;
        if row.name.trim() == Self::CREATE {
            return Ok(Self::new(CreateEntry::Create, with_grant));
        }
        let inner = P::from_row(&PermissionRow {
            name: row.name.clone(),
            with_grant: row.with_grant,
            create_with_grant: None,
        })?;
        Ok(Self::new(CreateEntry::PostCreate(inner), with_grant))
    }
}

impl<P: Permission> fmt::Display for CreatePermission<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            CreateEntry::Create => write!(f, "{}", Self::CREATE)?,
            CreateEntry::PostCreate(permission) => write!(f, "[{}]", permission)?,
        }
        if self.with_grant {
            write!(f, " /G")?;
        }
        Ok(())
    }
}
