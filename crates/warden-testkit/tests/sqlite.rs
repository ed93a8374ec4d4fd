//! The facade over a file-backed SQLite store, including reopening.

use tempfile::TempDir;
use warden::{AccessAdministration, AccessControl, ErrorKind, Warden};
use warden_core::{Resource, ResourcePermission};
use warden_store::SqliteStore;
use warden_testkit::fixtures::{
    domain_create, dp, fast_config, password, rp, set, TestFixture, SYSTEM_PASSWORD,
    USER_PASSWORD,
};

fn sqlite_fixture(dir: &TempDir) -> TestFixture<SqliteStore> {
    let store = SqliteStore::open(dir.path().join("warden.db")).unwrap();
    TestFixture::with_store(store, fast_config())
}

#[test]
fn test_scenario_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let fixture = sqlite_fixture(&dir);
    let parent = fixture.domain();
    let child = fixture.child_domain(&parent);
    let class = fixture.class(false, &["view"]);
    let account = fixture.resource(&class, &child);
    let alice = fixture.user(&parent);
    let group = fixture.user(&parent);
    let admin = fixture.admin();

    admin
        .set_domain_permissions(alice, &parent, &set([dp("view")]))
        .unwrap();
    admin
        .set_resource_permissions(group, account, &set([rp("view")]))
        .unwrap();
    admin
        .set_resource_permissions(alice, group, &set([rp(ResourcePermission::INHERIT)]))
        .unwrap();

    let alice_session = fixture.login(alice);
    assert!(alice_session
        .has_domain_permissions(alice, &child, &set([dp("view")]))
        .unwrap());
    assert!(alice_session
        .has_resource_permissions(alice, account, &set([rp("view")]))
        .unwrap());
    assert_eq!(
        alice_session
            .get_resources_by_resource_permission(alice, &class, &rp("view"), Some(&parent))
            .unwrap(),
        vec![account]
    );

    let err = admin
        .set_resource_permissions(group, alice, &set([rp(ResourcePermission::INHERIT)]))
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("cycle"));
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (domain, alice) = {
        let fixture = sqlite_fixture(&dir);
        let domain = fixture.domain();
        let alice = fixture.user(&domain);
        let admin = fixture.admin();
        admin
            .set_domain_permissions(alice, &domain, &set([dp("view")]))
            .unwrap();
        admin
            .set_domain_create_permissions(alice, &domain_create([dp("view")]))
            .unwrap();
        (domain, alice)
    };

    let store = SqliteStore::open(dir.path().join("warden.db")).unwrap();
    let warden = Warden::new(store, fast_config());

    let err = warden.install(&password(SYSTEM_PASSWORD)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut admin = warden.context();
    admin
        .authenticate(Resource::SYSTEM, &password(SYSTEM_PASSWORD))
        .unwrap();
    assert_eq!(
        admin.get_domain_permissions(alice, &domain).unwrap(),
        set([dp("view")])
    );
    assert_eq!(
        admin.get_domain_create_permissions(alice).unwrap(),
        domain_create([dp("view")])
    );

    let mut alice_session = warden.context();
    alice_session
        .authenticate(alice, &password(USER_PASSWORD))
        .unwrap();
    alice_session.create_domain("after-reopen", None).unwrap();
    assert!(alice_session
        .has_domain_permissions(alice, "after-reopen", &set([dp("view")]))
        .unwrap());
}
