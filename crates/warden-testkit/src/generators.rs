//! Proptest generators for property-based testing.

use proptest::prelude::*;
use proptest::sample::subsequence;

use warden_core::{
    DomainCreatePermission, DomainPermission, PermissionSet, ResourceCreatePermission,
    ResourcePermission,
};

/// A custom permission name: lowercase, no surrounding whitespace.
pub fn custom_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}".prop_map(String::from)
}

/// Leading or trailing whitespace.
pub fn padding() -> impl Strategy<Value = String> {
    "[ \t]{0,3}".prop_map(String::from)
}

/// `name` wrapped in random whitespace.
pub fn padded(name: String) -> impl Strategy<Value = String> {
    (padding(), padding()).prop_map(move |(before, after)| format!("{}{}{}", before, name, after))
}

/// A system or custom domain permission name.
pub fn domain_permission_name() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(DomainPermission::SYSTEM_NAMES.to_vec()).prop_map(String::from),
        custom_name(),
    ]
}

/// A domain permission set, unique by name.
pub fn domain_permission_set() -> impl Strategy<Value = PermissionSet<DomainPermission>> {
    prop::collection::btree_map(domain_permission_name(), any::<bool>(), 0..6).prop_map(|names| {
        names
            .into_iter()
            .filter_map(|(name, grant)| DomainPermission::with_grant_option(&name, grant).ok())
            .collect()
    })
}

/// A domain-create set: the `*CREATE` marker plus post-create entries.
pub fn domain_create_permission_set() -> impl Strategy<Value = PermissionSet<DomainCreatePermission>>
{
    (any::<bool>(), domain_permission_set(), any::<bool>()).prop_map(
        |(create_grant, post, post_grant)| {
            let marker = if create_grant {
                DomainCreatePermission::create_with_grant()
            } else {
                DomainCreatePermission::create()
            };
            std::iter::once(marker)
                .chain(post.into_iter().map(|permission| {
                    if post_grant {
                        DomainCreatePermission::post_create_with_grant(permission)
                    } else {
                        DomainCreatePermission::post_create(permission)
                    }
                }))
                .collect()
        },
    )
}

/// A resource permission set drawn from `names`, with random grant flags.
///
/// `names` should be valid for the target class: registered custom names
/// and applicable system names.
pub fn resource_permission_set(
    names: Vec<String>,
) -> impl Strategy<Value = PermissionSet<ResourcePermission>> {
    let len = names.len();
    subsequence(names, 0..=len)
        .prop_flat_map(|chosen| {
            let grants = prop::collection::vec(any::<bool>(), chosen.len());
            (Just(chosen), grants)
        })
        .prop_map(|(chosen, grants)| {
            chosen
                .iter()
                .zip(grants)
                .filter_map(|(name, grant)| ResourcePermission::with_grant_option(name, grant).ok())
                .collect()
        })
}

/// A resource-create set over `names`, always containing `*CREATE`.
pub fn resource_create_permission_set(
    names: Vec<String>,
) -> impl Strategy<Value = PermissionSet<ResourceCreatePermission>> {
    (any::<bool>(), resource_permission_set(names)).prop_map(|(create_grant, post)| {
        let marker = if create_grant {
            ResourceCreatePermission::create_with_grant()
        } else {
            ResourceCreatePermission::create()
        };
        std::iter::once(marker)
            .chain(post.into_iter().map(ResourceCreatePermission::post_create))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    proptest! {
        #[test]
        fn prop_padded_trims_back(name in custom_name().prop_flat_map(padded)) {
            let permission = ResourcePermission::new(&name).unwrap();
            prop_assert_eq!(permission.name(), name.trim());
        }

        #[test]
        fn prop_create_sets_carry_marker(set in domain_create_permission_set()) {
            prop_assert!(set.contains_key(DomainCreatePermission::CREATE));
        }
    }

    #[test]
    fn test_resource_set_draws_from_names() {
        let names = vec!["view".to_string(), "edit".to_string()];
        let mut runner = TestRunner::default();
        for _ in 0..32 {
            let set = resource_permission_set(names.clone())
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(set.keys().all(|key| key == "view" || key == "edit"));
        }
    }
}
