//! Resource and global resource permissions, `*INHERIT` and lookups.

use warden::config::EncryptorChoice;
use warden::{AccessAdministration, AccessControl, ContextConfig, ErrorKind};
use warden_auth::DigestParams;
use warden_core::{DomainPermission, NameMatching, PermissionSet, ResourcePermission};
use warden_perms::{PermissionSource, Resolver};
use warden_testkit::fixtures::{dp, rp, rp_g, set, TestFixture};

#[test]
fn test_direct_grant_and_check() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view", "edit"]);
    let account = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_resource_permissions(alice, account, &set([rp("view"), rp_g("edit")]))
        .unwrap();

    assert!(admin
        .has_resource_permissions(alice, account, &set([rp("view"), rp_g("edit")]))
        .unwrap());
    assert!(!admin
        .has_resource_permissions(alice, account, &set([rp_g("view")]))
        .unwrap());
    assert_eq!(
        admin.get_resource_permissions(alice, account).unwrap(),
        set([rp("view"), rp_g("edit")])
    );
}

#[test]
fn test_unregistered_permission_rejected() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);

    let err = fixture
        .admin()
        .set_resource_permissions(alice, account, &set([rp("fly")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("not defined"));
}

#[test]
fn test_unknown_system_name_rejected_at_construction() {
    let err = ResourcePermission::new("*FLY").unwrap_err();
    assert!(err.to_string().contains("*FLY"));
    assert!(DomainPermission::new("  ").is_err());
}

#[test]
fn test_identity_permissions_need_authenticatable_class() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &[]);
    let thing = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);
    let admin = fixture.admin();

    for name in [ResourcePermission::IMPERSONATE, ResourcePermission::RESET_CREDENTIALS] {
        let err = admin
            .set_resource_permissions(alice, thing, &set([rp(name)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        admin
            .set_resource_permissions(alice, bob, &set([rp(name)]))
            .unwrap();
    }

    admin
        .set_resource_permissions(alice, thing, &set([rp(ResourcePermission::DELETE)]))
        .unwrap();
}

#[test]
fn test_custom_permission_registration() {
    let fixture = TestFixture::new();
    let class = fixture.class(false, &["view"]);
    let admin = fixture.admin();

    let err = admin.create_resource_permission(&class, "*fly").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = admin.create_resource_permission(&class, " view ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    admin.create_resource_permission(&class, "edit").unwrap();
    let mut names = admin.get_resource_permission_names(&class).unwrap();
    names.sort();
    assert_eq!(names, vec!["edit".to_string(), "view".to_string()]);

    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let err = fixture
        .login(alice)
        .create_resource_permission(&class, "delete-later")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
}

#[test]
fn test_names_are_trimmed() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_resource_permissions(alice, account, &set([rp("  view\t")]))
        .unwrap();
    assert!(admin
        .has_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap());
}

#[test]
fn test_case_matching_follows_config() {
    let sensitive = TestFixture::new();
    let domain = sensitive.domain();
    let class = sensitive.class(false, &["view"]);
    let account = sensitive.resource(&class, &domain);
    let alice = sensitive.user(&domain);
    let err = sensitive
        .admin()
        .set_resource_permissions(alice, account, &set([rp("VIEW")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let insensitive = TestFixture::with_config(ContextConfig {
        name_matching: NameMatching::CaseInsensitive,
        encryptor: EncryptorChoice::Digest(DigestParams {
            iterations: 10,
            ..DigestParams::default()
        }),
        ..ContextConfig::default()
    });
    let domain = insensitive.domain();
    let class = insensitive.class(false, &["view"]);
    let account = insensitive.resource(&class, &domain);
    let alice = insensitive.user(&domain);
    let admin = insensitive.admin();

    admin
        .set_resource_permissions(alice, account, &set([rp("VIEW")]))
        .unwrap();
    assert_eq!(
        admin.get_resource_permissions(alice, account).unwrap(),
        set([rp("view")])
    );
    assert!(admin
        .has_resource_permissions(alice, account, &set([rp("View")]))
        .unwrap());
}

#[test]
fn test_inherit_is_transitive() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);
    let group = fixture.user(&domain);
    let parent_group = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_resource_permissions(parent_group, account, &set([rp("view")]))
        .unwrap();
    admin
        .set_resource_permissions(group, parent_group, &set([rp(ResourcePermission::INHERIT)]))
        .unwrap();
    admin
        .set_resource_permissions(alice, group, &set([rp(ResourcePermission::INHERIT)]))
        .unwrap();

    assert!(admin.get_resource_permissions(alice, account).unwrap().is_empty());
    assert_eq!(
        admin.get_effective_resource_permissions(alice, account).unwrap(),
        set([rp("view")])
    );

    // Domain permissions flow through inheritance as well.
    admin
        .set_domain_permissions(parent_group, &domain, &set([dp("audit")]))
        .unwrap();
    assert!(admin
        .has_domain_permissions(alice, &domain, &set([dp("audit")]))
        .unwrap());
}

#[test]
fn test_inherited_permissions_record_their_source() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);
    let group = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_resource_permissions(group, account, &set([rp("view")]))
        .unwrap();
    admin
        .set_resource_permissions(alice, group, &set([rp(ResourcePermission::INHERIT)]))
        .unwrap();

    let resolver = Resolver::new(fixture.warden.store());
    let effective = resolver.resource_permissions(alice, account).unwrap();
    assert!(effective.has(&rp("view")));
    assert_eq!(
        effective.sources(),
        &[PermissionSource::Inherited { from: group }]
    );
}

#[test]
fn test_inherit_cycle_rejected() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);
    let carol = fixture.user(&domain);
    let admin = fixture.admin();
    let inherit = set([rp(ResourcePermission::INHERIT)]);

    admin.set_resource_permissions(alice, bob, &inherit).unwrap();
    admin.set_resource_permissions(bob, carol, &inherit).unwrap();

    let err = admin
        .set_resource_permissions(carol, alice, &inherit)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().to_lowercase().contains("cycle"));
    assert!(admin.get_resource_permissions(carol, alice).unwrap().is_empty());

    let err = admin.set_resource_permissions(alice, alice, &inherit).unwrap_err();
    assert!(err.to_string().to_lowercase().contains("cycle"));
}

#[test]
fn test_global_permissions_cover_descendant_domains() {
    let fixture = TestFixture::new();
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let class = fixture.class(false, &["view", "edit"]);
    let account = fixture.resource(&class, &child);
    let alice = fixture.user(&parent);
    let admin = fixture.admin();

    admin
        .set_global_resource_permissions(alice, &class, &parent, &set([rp("view")]))
        .unwrap();

    assert!(admin
        .has_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap());
    assert!(admin
        .has_global_resource_permissions(alice, &class, &child, &set([rp("view")]))
        .unwrap());
    assert!(admin
        .get_global_resource_permissions(alice, &class, &child)
        .unwrap()
        .is_empty());
    assert_eq!(
        admin
            .get_effective_global_resource_permissions(alice, &class, &child)
            .unwrap(),
        set([rp("view")])
    );

    let direct = admin.get_global_resource_permissions_map(alice).unwrap();
    assert_eq!(direct[&parent][&class], set([rp("view")]));
    assert!(!direct.contains_key(&child));

    let effective = admin
        .get_effective_global_resource_permissions_map(alice)
        .unwrap();
    assert_eq!(effective[&child][&class], set([rp("view")]));
}

#[test]
fn test_global_inherit_rejected() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);

    let err = fixture
        .admin()
        .set_global_resource_permissions(
            alice,
            fixture.user_class(),
            &domain,
            &set([rp(ResourcePermission::INHERIT)]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_global_grant_gating() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);

    fixture
        .admin()
        .set_global_resource_permissions(alice, &class, &domain, &set([rp("view")]))
        .unwrap();
    let alice_session = fixture.login(alice);

    let err = alice_session
        .set_global_resource_permissions(bob, &class, &domain, &set([rp("view")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);

    fixture
        .admin()
        .set_global_resource_permissions(alice, &class, &domain, &set([rp_g("view")]))
        .unwrap();
    alice_session
        .set_global_resource_permissions(bob, &class, &domain, &set([rp("view")]))
        .unwrap();
}

#[test]
fn test_super_user_absorbs_resource_permissions() {
    let fixture = TestFixture::new();
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &child);
    let alice = fixture.user(&parent);
    let bob = fixture.user(&parent);
    let admin = fixture.admin();

    admin
        .set_domain_permissions(alice, &parent, &set([dp(DomainPermission::SUPER_USER)]))
        .unwrap();

    let effective = admin
        .get_effective_resource_permissions(alice, account)
        .unwrap();
    assert!(effective.contains(&rp_g("view")));
    assert!(effective.contains(&rp_g(ResourcePermission::DELETE)));
    assert!(!effective.contains_key(ResourcePermission::IMPERSONATE));

    fixture
        .login(alice)
        .set_resource_permissions(bob, account, &set([rp_g("view")]))
        .unwrap();
}

#[test]
fn test_query_authorization_on_resource_reads() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);

    fixture
        .admin()
        .set_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap();
    let bob_session = fixture.login(bob);

    assert!(!bob_session
        .has_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap());
    let err = bob_session
        .assert_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    let err = bob_session
        .get_effective_resource_permissions(alice, account)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);

    let alice_session = fixture.login(alice);
    alice_session
        .assert_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap();
}

#[test]
fn test_resources_by_permission() {
    let fixture = TestFixture::new();
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let class = fixture.class(false, &["view"]);
    let in_parent = fixture.resource(&class, &parent);
    let in_child = fixture.resource(&class, &child);
    let hidden = fixture.resource(&class, &child);
    let alice = fixture.user(&parent);
    let admin = fixture.admin();

    admin
        .set_resource_permissions(alice, in_parent, &set([rp("view")]))
        .unwrap();
    admin
        .set_resource_permissions(alice, in_child, &set([rp("view")]))
        .unwrap();

    let view = rp("view");
    let mut all = admin
        .get_resources_by_resource_permission(alice, &class, &view, None)
        .unwrap();
    all.sort();
    assert_eq!(all, vec![in_parent, in_child]);
    assert!(!all.contains(&hidden));

    let scoped = admin
        .get_resources_by_resource_permission(alice, &class, &view, Some(&child))
        .unwrap();
    assert_eq!(scoped, vec![in_child]);

    let accessors = admin
        .get_accessor_resources_by_resource_permission(in_child, fixture.user_class(), &view)
        .unwrap();
    assert_eq!(accessors, vec![alice]);
}

#[test]
fn test_class_metadata() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &domain);
    let admin = fixture.admin();

    let info = admin.get_resource_class_info(&format!(" {} ", class)).unwrap();
    assert_eq!(info.name, class);
    assert!(!info.authenticatable);
    assert_eq!(admin.get_resource_class_info_by_resource(account).unwrap(), info);
    assert!(admin
        .get_resource_class_names()
        .unwrap()
        .contains(&class));

    let err = admin.get_resource_class_info("NoSuchClass").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = admin.create_resource_class(&class, false, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_empty_set_clears_resource_permissions() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &domain);
    let alice = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap();
    admin
        .set_resource_permissions(alice, account, &PermissionSet::new())
        .unwrap();
    assert!(admin
        .get_effective_resource_permissions(alice, account)
        .unwrap()
        .is_empty());
}
