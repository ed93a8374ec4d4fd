//! Domain and resource permissions.
//!
//! A permission is a normalized name plus a `with_grant` flag. Two
//! permissions are equal when both match. Sets deduplicate by name only, see
//! [`crate::PermissionSet`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::validation::normalize_name;

/// How custom (non-system) permission names are compared.
///
/// System names always match exactly after trimming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameMatching {
    /// `"Edit"` and `"edit"` are different permissions.
    #[default]
    CaseSensitive,
    /// `"Edit"` and `"edit"` are the same permission.
    CaseInsensitive,
}

impl NameMatching {
    /// Compare two already-trimmed custom names.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        match self {
            NameMatching::CaseSensitive => a == b,
            NameMatching::CaseInsensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

/// Storage form of any permission kind.
///
/// `create_with_grant` is only present for create permissions, where
/// `name`/`with_grant` describe the post-create entry (or `*CREATE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRow {
    pub name: String,
    pub with_grant: bool,
    pub create_with_grant: Option<bool>,
}

/// Behaviour shared by the four permission kinds.
pub trait Permission: Clone + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Key under which the permission is deduplicated inside a set.
    fn key(&self) -> &str;

    /// Whether `held` (same key) satisfies this permission when it is required.
    fn is_satisfied_by(&self, held: &Self) -> bool;

    /// Whether `held` (same key) carries the authority to assign this permission.
    fn is_grantable_from(&self, held: &Self) -> bool;

    /// Fold another entry with the same key into this one. Grant is monotonic.
    fn merge(&mut self, other: &Self);

    /// This permission with every grant flag set.
    fn with_all_grants(&self) -> Self;

    fn to_row(&self) -> PermissionRow;

    fn from_row(row: &PermissionRow) -> Result<Self, ValidationError>;
}

fn normalize_permission_name(
    raw: &str,
    system_names: &[&'static str],
) -> Result<String, ValidationError> {
    let name = normalize_name(raw, "permission")?;
    if name.starts_with('*') && !system_names.contains(&name.as_str()) {
        return Err(ValidationError::UnknownSystemPermission(name));
    }
    Ok(name)
}

fn simple_from_row(
    row: &PermissionRow,
    system_names: &[&'static str],
) -> Result<(String, bool), ValidationError> {
    if row.create_with_grant.is_some() {
        return Err(ValidationError::MalformedRow(format!(
            "{} carries a create grant flag",
            row.name
        )));
    }
    Ok((normalize_permission_name(&row.name, system_names)?, row.with_grant))
}

/// Decoded form of a domain or resource permission, checked before use.
#[derive(Deserialize)]
pub struct RawPermission {
    name: String,
    with_grant: bool,
}

fn write_permission(f: &mut fmt::Formatter<'_>, name: &str, with_grant: bool) -> fmt::Result {
    if with_grant {
        write!(f, "{} /G", name)
    } else {
        write!(f, "{}", name)
    }
}

/// A permission held on a domain.
///
/// Domain permissions assigned on a domain are inherited by every
/// descendant domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPermission")]
pub struct DomainPermission {
    name: String,
    with_grant: bool,
}

impl DomainPermission {
    /// Absorbing permission: holds everything on the domain and below.
    pub const SUPER_USER: &'static str = "*SUPER-USER";
    /// May create child domains under the domain.
    pub const CREATE_CHILD_DOMAIN: &'static str = "*CREATE-CHILD-DOMAIN";
    /// May delete the domain.
    pub const DELETE: &'static str = "*DELETE";

    /// Every reserved domain permission name.
    pub const SYSTEM_NAMES: [&'static str; 3] =
        [Self::SUPER_USER, Self::CREATE_CHILD_DOMAIN, Self::DELETE];

    /// Create a permission without grant authority.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        Self::with_grant_option(name, false)
    }

    /// Create a permission with grant authority.
    pub fn with_grant(name: &str) -> Result<Self, ValidationError> {
        Self::with_grant_option(name, true)
    }

    /// Create a permission with an explicit grant flag.
    pub fn with_grant_option(name: &str, with_grant: bool) -> Result<Self, ValidationError> {
        Ok(Self {
            name: normalize_permission_name(name, &Self::SYSTEM_NAMES)?,
            with_grant,
        })
    }

    /// Every system domain permission, with grant.
    pub fn all_system() -> Vec<Self> {
        Self::SYSTEM_NAMES
            .iter()
            .map(|name| Self {
                name: (*name).to_string(),
                with_grant: true,
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_with_grant(&self) -> bool {
        self.with_grant
    }

    pub fn is_system(&self) -> bool {
        self.name.starts_with('*')
    }

    /// Rewrite a custom name under case-insensitive matching.
    pub fn fold_case(&self) -> Self {
        if self.is_system() {
            return self.clone();
        }
        Self {
            name: self.name.to_ascii_lowercase(),
            with_grant: self.with_grant,
        }
    }
}

impl Permission for DomainPermission {
    fn key(&self) -> &str {
        &self.name
    }

    fn is_satisfied_by(&self, held: &Self) -> bool {
        held.with_grant || !self.with_grant
    }

    fn is_grantable_from(&self, held: &Self) -> bool {
        held.with_grant
    }

    fn merge(&mut self, other: &Self) {
        self.with_grant |= other.with_grant;
    }

    fn with_all_grants(&self) -> Self {
        Self {
            name: self.name.clone(),
            with_grant: true,
        }
    }

    fn to_row(&self) -> PermissionRow {
        PermissionRow {
            name: self.name.clone(),
            with_grant: self.with_grant,
            create_with_grant: None,
        }
    }

    fn from_row(row: &PermissionRow) -> Result<Self, ValidationError> {
        let (name, with_grant) = simple_from_row(row, &Self::SYSTEM_NAMES)?;
        Ok(Self { name, with_grant })
    }
}

impl TryFrom<RawPermission> for DomainPermission {
    type Error = ValidationError;

    fn try_from(raw: RawPermission) -> Result<Self, Self::Error> {
        Self::with_grant_option(&raw.name, raw.with_grant)
    }
}

impl fmt::Display for DomainPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_permission(f, &self.name, self.with_grant)
    }
}

/// A permission held on a resource, or globally on every resource of a class
/// within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPermission")]
pub struct ResourcePermission {
    name: String,
    with_grant: bool,
}

impl ResourcePermission {
    /// The accessor inherits every permission of the accessed resource.
    pub const INHERIT: &'static str = "*INHERIT";
    /// The accessor may impersonate the accessed resource.
    pub const IMPERSONATE: &'static str = "*IMPERSONATE";
    /// The accessor may replace the accessed resource's credentials.
    pub const RESET_CREDENTIALS: &'static str = "*RESET-CREDENTIALS";
    /// The accessor may delete the accessed resource.
    pub const DELETE: &'static str = "*DELETE";
    /// The accessor may query the accessed resource's permissions.
    pub const QUERY: &'static str = "*QUERY";

    /// Every reserved resource permission name.
    pub const SYSTEM_NAMES: [&'static str; 5] = [
        Self::INHERIT,
        Self::IMPERSONATE,
        Self::RESET_CREDENTIALS,
        Self::DELETE,
        Self::QUERY,
    ];

    /// Create a permission without grant authority.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        Self::with_grant_option(name, false)
    }

    /// Create a permission with grant authority.
    pub fn with_grant(name: &str) -> Result<Self, ValidationError> {
        Self::with_grant_option(name, true)
    }

    /// Create a permission with an explicit grant flag.
    pub fn with_grant_option(name: &str, with_grant: bool) -> Result<Self, ValidationError> {
        Ok(Self {
            name: normalize_permission_name(name, &Self::SYSTEM_NAMES)?,
            with_grant,
        })
    }

    /// System resource permissions applicable to a class, with grant.
    pub fn all_system(authenticatable: bool) -> Vec<Self> {
        Self::SYSTEM_NAMES
            .iter()
            .filter(|name| authenticatable || !Self::requires_authenticatable(name))
            .map(|name| Self {
                name: (*name).to_string(),
                with_grant: true,
            })
            .collect()
    }

    /// Whether a system name only makes sense on authenticatable classes.
    pub fn requires_authenticatable(name: &str) -> bool {
        name == Self::IMPERSONATE || name == Self::RESET_CREDENTIALS
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_with_grant(&self) -> bool {
        self.with_grant
    }

    pub fn is_system(&self) -> bool {
        self.name.starts_with('*')
    }

    /// Same grant flag, different (already normalized) name.
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            with_grant: self.with_grant,
        }
    }
}

impl Permission for ResourcePermission {
    fn key(&self) -> &str {
        &self.name
    }

    fn is_satisfied_by(&self, held: &Self) -> bool {
        held.with_grant || !self.with_grant
    }

    fn is_grantable_from(&self, held: &Self) -> bool {
        held.with_grant
    }

    fn merge(&mut self, other: &Self) {
        self.with_grant |= other.with_grant;
    }

    fn with_all_grants(&self) -> Self {
        Self {
            name: self.name.clone(),
            with_grant: true,
        }
    }

    fn to_row(&self) -> PermissionRow {
        PermissionRow {
            name: self.name.clone(),
            with_grant: self.with_grant,
            create_with_grant: None,
        }
    }

    fn from_row(row: &PermissionRow) -> Result<Self, ValidationError> {
        let (name, with_grant) = simple_from_row(row, &Self::SYSTEM_NAMES)?;
        Ok(Self { name, with_grant })
    }
}

impl TryFrom<RawPermission> for ResourcePermission {
    type Error = ValidationError;

    fn try_from(raw: RawPermission) -> Result<Self, Self::Error> {
        Self::with_grant_option(&raw.name, raw.with_grant)
    }
}

impl fmt::Display for ResourcePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_permission(f, &self.name, self.with_grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_trimmed() {
        let padded = DomainPermission::new(" \tview  ").unwrap();
        assert_eq!(padded.name(), "view");
        assert_eq!(padded, DomainPermission::new("view").unwrap());
    }

    #[test]
    fn test_system_names_trimmed_and_exact() {
        let su = DomainPermission::new("*SUPER-USER \t").unwrap();
        assert_eq!(su.name(), DomainPermission::SUPER_USER);
        assert!(su.is_system());

        let err = DomainPermission::new("*super-user").unwrap_err();
        assert_eq!(err, ValidationError::UnknownSystemPermission("*super-user".into()));
    }

    #[test]
    fn test_custom_names_case_sensitive_by_value() {
        let lower = ResourcePermission::new("edit").unwrap();
        let upper = ResourcePermission::new("Edit").unwrap();
        assert_ne!(lower, upper);
        assert!(NameMatching::CaseInsensitive.matches(lower.name(), upper.name()));
        assert!(!NameMatching::CaseSensitive.matches(lower.name(), upper.name()));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            ResourcePermission::new("   ").unwrap_err(),
            ValidationError::EmptyName { what: "permission" }
        );
    }

    #[test]
    fn test_grant_semantics() {
        let plain = ResourcePermission::new("view").unwrap();
        let granted = ResourcePermission::with_grant("view").unwrap();

        assert!(plain.is_satisfied_by(&granted));
        assert!(!granted.is_satisfied_by(&plain));
        assert!(plain.is_grantable_from(&granted));
        assert!(!plain.is_grantable_from(&plain));

        let mut merged = plain.clone();
        merged.merge(&granted);
        assert_eq!(merged, granted);
    }

    #[test]
    fn test_row_conversion_rejects_create_flag() {
        let row = PermissionRow {
            name: "view".into(),
            with_grant: false,
            create_with_grant: Some(true),
        };
        assert!(matches!(
            DomainPermission::from_row(&row),
            Err(ValidationError::MalformedRow(_))
        ));
    }

    #[test]
    fn test_system_permissions_for_unauthenticatable_class() {
        let names: Vec<String> = ResourcePermission::all_system(false)
            .into_iter()
            .map(|p| p.name().to_string())
            .collect();
        assert!(names.contains(&ResourcePermission::INHERIT.to_string()));
        assert!(!names.contains(&ResourcePermission::IMPERSONATE.to_string()));
        assert!(!names.contains(&ResourcePermission::RESET_CREDENTIALS.to_string()));
    }

    #[test]
    fn test_display_marks_grant() {
        assert_eq!(DomainPermission::with_grant("*DELETE").unwrap().to_string(), "*DELETE /G");
        assert_eq!(DomainPermission::new("view").unwrap().to_string(), "view");
    }

    #[test]
    fn test_decoding_validates_names() {
        let padded: DomainPermission =
            serde_json::from_str(r#"{"name":"  view ","with_grant":true}"#).unwrap();
        assert_eq!(padded, DomainPermission::with_grant("view").unwrap());

        assert!(serde_json::from_str::<DomainPermission>(r#"{"name":"*BOGUS","with_grant":false}"#)
            .is_err());
        assert!(serde_json::from_str::<ResourcePermission>(r#"{"name":"   ","with_grant":false}"#)
            .is_err());
        assert!(serde_json::from_str::<ResourcePermission>(r#"{"name":"*SUPER-USER","with_grant":false}"#)
            .is_err());
    }
}
