//! Name normalization and permission-set validation.

use crate::create::{DomainCreatePermission, ResourceCreatePermission};
use crate::error::ValidationError;
use crate::permission::{DomainPermission, NameMatching, ResourcePermission};
use crate::set::PermissionSet;
use crate::types::ResourceClassInfo;

/// Trim a name and reject it if nothing remains.
pub fn normalize_name(raw: &str, what: &'static str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName { what });
    }
    Ok(trimmed.to_string())
}

/// Lookup key for a resource class name: trimmed and lowercased.
pub fn class_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A non-empty domain-create set must contain the `*CREATE` marker.
pub fn validate_domain_create_permissions(
    permissions: &PermissionSet<DomainCreatePermission>,
) -> Result<(), ValidationError> {
    if !permissions.is_empty() && !permissions.contains_key(DomainCreatePermission::CREATE) {
        return Err(ValidationError::MissingCreatePermission);
    }
    Ok(())
}

/// A non-empty resource-create set must contain the `*CREATE` marker.
pub fn validate_resource_create_permissions(
    permissions: &PermissionSet<ResourceCreatePermission>,
) -> Result<(), ValidationError> {
    if !permissions.is_empty() && !permissions.contains_key(ResourceCreatePermission::CREATE) {
        return Err(ValidationError::MissingCreatePermission);
    }
    Ok(())
}

/// Rewrite a custom domain permission name under the matching policy.
pub fn canonical_domain_permission(
    permission: &DomainPermission,
    matching: NameMatching,
) -> DomainPermission {
    match matching {
        NameMatching::CaseSensitive => permission.clone(),
        NameMatching::CaseInsensitive => permission.fold_case(),
    }
}

/// Check a resource permission against its class and return it spelled the
/// way it was registered.
///
/// System names must be applicable to the class. Custom names must be one of
/// `registered`, compared under `matching`.
pub fn canonical_resource_permission(
    permission: &ResourcePermission,
    class: &ResourceClassInfo,
    registered: &[String],
    matching: NameMatching,
) -> Result<ResourcePermission, ValidationError> {
    if permission.is_system() {
        if ResourcePermission::requires_authenticatable(permission.name()) && !class.authenticatable
        {
            return Err(ValidationError::RequiresAuthenticatable {
                permission: permission.name().to_string(),
                class: class.name.clone(),
            });
        }
        return Ok(permission.clone());
    }
    registered
        .iter()
        .find(|name| matching.matches(name, permission.name()))
        .map(|name| permission.renamed(name))
        .ok_or_else(|| ValidationError::PermissionNotDefined {
            permission: permission.name().to_string(),
            class: class.name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> ResourceClassInfo {
        ResourceClassInfo::new("Account", false, false)
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  root ", "domain").unwrap(), "root");
        assert_eq!(
            normalize_name("\t", "domain").unwrap_err(),
            ValidationError::EmptyName { what: "domain" }
        );
    }

    #[test]
    fn test_class_key_ignores_case_and_padding() {
        assert_eq!(class_key(" Account "), class_key("account"));
    }

    #[test]
    fn test_create_marker_required() {
        let empty = PermissionSet::<DomainCreatePermission>::new();
        assert!(validate_domain_create_permissions(&empty).is_ok());

        let missing: PermissionSet<_> = [DomainCreatePermission::post_create(
            DomainPermission::new("*DELETE").unwrap(),
        )]
        .into_iter()
        .collect();
        let err = validate_domain_create_permissions(&missing).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("create must be specified"));

        let present: PermissionSet<_> = [ResourceCreatePermission::create()].into_iter().collect();
        assert!(validate_resource_create_permissions(&present).is_ok());
    }

    #[test]
    fn test_unregistered_custom_name_rejected() {
        let edit = ResourcePermission::new("edit").unwrap();
        let err = canonical_resource_permission(&edit, &account(), &["view".into()], NameMatching::CaseSensitive)
            .unwrap_err();
        assert!(matches!(err, ValidationError::PermissionNotDefined { .. }));
    }

    #[test]
    fn test_case_insensitive_uses_registered_spelling() {
        let view = ResourcePermission::new("VIEW").unwrap();
        let registered = vec!["View".to_string()];

        let canonical =
            canonical_resource_permission(&view, &account(), &registered, NameMatching::CaseInsensitive)
                .unwrap();
        assert_eq!(canonical.name(), "View");

        assert!(canonical_resource_permission(&view, &account(), &registered, NameMatching::CaseSensitive)
            .is_err());
    }

    #[test]
    fn test_impersonate_needs_authenticatable_class() {
        let impersonate = ResourcePermission::new("*IMPERSONATE").unwrap();
        let err = canonical_resource_permission(&impersonate, &account(), &[], NameMatching::CaseSensitive)
            .unwrap_err();
        assert!(matches!(err, ValidationError::RequiresAuthenticatable { .. }));

        let user = ResourceClassInfo::new("User", true, false);
        assert!(canonical_resource_permission(&impersonate, &user, &[], NameMatching::CaseSensitive).is_ok());
    }
}
