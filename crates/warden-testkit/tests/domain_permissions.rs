//! Domain permissions: inheritance down the tree, grant gating, full replace,
//! super-user absorption and query authorization.

use warden::{AccessAdministration, AccessControl, ErrorKind};
use warden_core::{DomainPermission, PermissionSet, ResourcePermission};
use warden_testkit::fixtures::{dp, dp_g, rp, set, TestFixture};

#[test]
fn test_view_granted_on_root_applies_to_child() {
    let fixture = TestFixture::new();
    let admin = fixture.admin();

    admin.create_domain("root", None).unwrap();
    admin.create_domain("root/sales", Some("root")).unwrap();
    admin.create_resource_class("Account", false, false).unwrap();
    let r1 = admin.create_resource("Account", "root/sales", None).unwrap();
    let a = fixture.user("root");

    admin
        .set_domain_permissions(a, "root", &set([dp("view")]))
        .unwrap();

    let effective = admin
        .get_effective_domain_permissions(a, "root/sales")
        .unwrap();
    assert!(effective.contains(&dp("view")));
    assert!(admin
        .has_domain_permissions(a, "root/sales", &set([dp("view")]))
        .unwrap());
    assert!(!admin
        .has_domain_permissions(a, "root/sales", &set([dp("edit")]))
        .unwrap());
    assert_eq!(admin.get_domain_name_by_resource(r1).unwrap(), "root/sales");
}

#[test]
fn test_permissions_do_not_flow_up() {
    let fixture = TestFixture::new();
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let alice = fixture.user(&parent);

    fixture
        .admin()
        .set_domain_permissions(alice, &child, &set([dp("view")]))
        .unwrap();

    let admin = fixture.admin();
    assert!(admin
        .has_domain_permissions(alice, &child, &set([dp("view")]))
        .unwrap());
    assert!(!admin
        .has_domain_permissions(alice, &parent, &set([dp("view")]))
        .unwrap());
    assert!(admin
        .get_effective_domain_permissions(alice, &parent)
        .unwrap()
        .is_empty());
}

#[test]
fn test_direct_getter_excludes_inherited() {
    let fixture = TestFixture::new();
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let alice = fixture.user(&parent);
    let admin = fixture.admin();

    admin
        .set_domain_permissions(alice, &parent, &set([dp("view")]))
        .unwrap();
    assert!(admin.get_domain_permissions(alice, &child).unwrap().is_empty());

    let direct = admin.get_domain_permissions_map(alice).unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[&parent], set([dp("view")]));

    let effective = admin.get_effective_domain_permissions_map(alice).unwrap();
    assert_eq!(effective[&child], set([dp("view")]));
}

#[test]
fn test_grant_needed_to_assign() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);

    fixture
        .admin()
        .set_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap();
    let alice_session = fixture.login(alice);

    let err = alice_session
        .set_domain_permissions(bob, &domain, &set([dp("view")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert!(err.to_string().to_lowercase().contains("not authorized"));

    fixture
        .admin()
        .set_domain_permissions(alice, &domain, &set([dp_g("view")]))
        .unwrap();
    alice_session
        .set_domain_permissions(bob, &domain, &set([dp("view")]))
        .unwrap();
    assert_eq!(
        fixture.admin().get_domain_permissions(bob, &domain).unwrap(),
        set([dp("view")])
    );
}

#[test]
fn test_partial_authority_writes_nothing() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);

    fixture
        .admin()
        .set_domain_permissions(alice, &domain, &set([dp_g("view"), dp("edit")]))
        .unwrap();
    let alice_session = fixture.login(alice);

    let err = alice_session
        .set_domain_permissions(bob, &domain, &set([dp("view"), dp("edit")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert!(err.to_string().contains("edit"));
    assert!(fixture
        .admin()
        .get_domain_permissions(bob, &domain)
        .unwrap()
        .is_empty());
}

#[test]
fn test_grant_from_ancestor_domain() {
    let fixture = TestFixture::new();
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let alice = fixture.user(&parent);
    let bob = fixture.user(&parent);

    fixture
        .admin()
        .set_domain_permissions(alice, &parent, &set([dp_g("view")]))
        .unwrap();
    fixture
        .login(alice)
        .set_domain_permissions(bob, &child, &set([dp_g("view")]))
        .unwrap();
}

#[test]
fn test_replace_not_merge() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_domain_permissions(alice, &domain, &set([dp("view"), dp("edit")]))
        .unwrap();
    admin
        .set_domain_permissions(alice, &domain, &set([dp_g("edit")]))
        .unwrap();
    assert_eq!(
        admin.get_effective_domain_permissions(alice, &domain).unwrap(),
        set([dp_g("edit")])
    );

    admin
        .set_domain_permissions(alice, &domain, &PermissionSet::new())
        .unwrap();
    assert!(admin
        .get_effective_domain_permissions(alice, &domain)
        .unwrap()
        .is_empty());
}

#[test]
fn test_revoking_needs_grant_but_keeping_does_not() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);

    fixture
        .admin()
        .set_domain_permissions(bob, &domain, &set([dp("view"), dp("edit")]))
        .unwrap();
    fixture
        .admin()
        .set_domain_permissions(alice, &domain, &set([dp_g("edit")]))
        .unwrap();
    let alice_session = fixture.login(alice);

    // Keeps view untouched, revokes edit.
    alice_session
        .set_domain_permissions(bob, &domain, &set([dp("view")]))
        .unwrap();

    // Revoking view needs grant on view.
    let err = alice_session
        .set_domain_permissions(bob, &domain, &PermissionSet::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
}

#[test]
fn test_super_user_holds_everything_below() {
    let fixture = TestFixture::new();
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let alice = fixture.user(&parent);
    let bob = fixture.user(&parent);

    fixture
        .admin()
        .set_domain_permissions(alice, &parent, &set([dp(DomainPermission::SUPER_USER)]))
        .unwrap();

    let effective = fixture
        .admin()
        .get_effective_domain_permissions(alice, &child)
        .unwrap();
    for name in DomainPermission::SYSTEM_NAMES {
        assert!(effective.contains(&dp_g(name)), "missing {}", name);
    }

    // Absorption covers custom names too, with grant.
    fixture
        .login(alice)
        .set_domain_permissions(bob, &child, &set([dp_g("anything")]))
        .unwrap();
}

#[test]
fn test_names_are_trimmed() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_domain_permissions(alice, &format!("  {} ", domain), &set([dp("  view\t")]))
        .unwrap();
    assert!(admin
        .has_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap());
}

#[test]
fn test_query_needs_query_permission() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);

    fixture
        .admin()
        .set_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap();
    let bob_session = fixture.login(bob);

    let err = bob_session
        .get_domain_permissions(alice, &domain)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert!(!bob_session
        .has_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap());

    // Own permissions are always visible.
    assert!(bob_session.get_domain_permissions(bob, &domain).unwrap().is_empty());

    fixture
        .admin()
        .set_resource_permissions(bob, alice, &set([rp(ResourcePermission::QUERY)]))
        .unwrap();
    assert!(bob_session
        .has_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap());
    assert_eq!(
        bob_session.get_domain_permissions(alice, &domain).unwrap(),
        set([dp("view")])
    );
}

#[test]
fn test_assert_form() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let admin = fixture.admin();

    admin
        .set_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap();
    admin
        .assert_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap();

    let err = admin
        .assert_domain_permissions(alice, &domain, &set([dp_g("view")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
}

#[test]
fn test_validation_before_authorization() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);
    let bob = fixture.user(&domain);
    let bob_session = fixture.login(bob);

    let err = bob_session
        .has_domain_permissions(alice, &domain, &PermissionSet::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = bob_session
        .set_domain_permissions(alice, "   ", &set([dp("view")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = bob_session
        .set_domain_permissions(alice, "no-such-domain", &set([dp("view")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_unauthenticated_session_cannot_assign() {
    let fixture = TestFixture::new();
    let domain = fixture.domain();
    let alice = fixture.user(&domain);

    let err = fixture
        .context()
        .set_domain_permissions(alice, &domain, &set([dp("view")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}
