//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an installed in-memory store, an
//! authenticated system context, and generators for uniquely named domains,
//! classes and resources so tests never collide.

use rand::distributions::Alphanumeric;
use rand::Rng;

use warden::config::EncryptorChoice;
use warden::{AccessAdministration, AccessControl, AccessControlContext, ContextConfig, Warden};
use warden_auth::DigestParams;
use warden_core::{
    DomainCreatePermission, DomainPermission, Password, Permission, PermissionSet, Resource,
    ResourceCreatePermission, ResourcePermission,
};
use warden_store::{MemoryStore, Store};

/// Password of the installed system resource.
pub const SYSTEM_PASSWORD: &str = "system-password";

/// Password given to every resource created by [`TestFixture::user`].
pub const USER_PASSWORD: &str = "user-password";

/// A configuration with cheap hashing.
pub fn fast_config() -> ContextConfig {
    ContextConfig {
        encryptor: EncryptorChoice::Digest(DigestParams {
            iterations: 10,
            ..DigestParams::default()
        }),
        ..ContextConfig::default()
    }
}

/// `prefix` plus a random alphanumeric suffix.
pub fn unique_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix)
}

pub fn password(plaintext: &str) -> Password {
    Password::new(plaintext).expect("valid test password")
}

/// An installed store plus an authenticated system context.
pub struct TestFixture<S: Store = MemoryStore> {
    pub warden: Warden<S>,
    pub system: Resource,
    admin: AccessControlContext<S>,
    user_class: String,
}

impl TestFixture<MemoryStore> {
    /// Fresh in-memory store with cheap hashing.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), fast_config())
    }

    /// Fresh in-memory store with the given configuration.
    pub fn with_config(config: ContextConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> TestFixture<S> {
    /// Install into `store` and authenticate a system context.
    pub fn with_store(store: S, config: ContextConfig) -> Self {
        let warden = Warden::new(store, config);
        let system = warden
            .install(&password(SYSTEM_PASSWORD))
            .expect("install system resource");
        let mut admin = warden.context();
        admin
            .authenticate(system, &password(SYSTEM_PASSWORD))
            .expect("authenticate system resource");

        let user_class = unique_name("User");
        admin
            .create_resource_class(&user_class, true, false)
            .expect("create user class");

        Self {
            warden,
            system,
            admin,
            user_class,
        }
    }

    /// The authenticated system context.
    pub fn admin(&self) -> &AccessControlContext<S> {
        &self.admin
    }

    /// A new, unauthenticated context.
    pub fn context(&self) -> AccessControlContext<S> {
        self.warden.context()
    }

    /// A context authenticated as `resource` with [`USER_PASSWORD`].
    pub fn login(&self, resource: Resource) -> AccessControlContext<S> {
        let mut context = self.warden.context();
        context
            .authenticate(resource, &password(USER_PASSWORD))
            .expect("authenticate test user");
        context
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Domains and Classes
    // ─────────────────────────────────────────────────────────────────────────

    /// A new root domain.
    pub fn domain(&self) -> String {
        let name = unique_name("domain");
        self.admin.create_domain(&name, None).expect("create domain");
        name
    }

    /// A new domain under `parent`.
    pub fn child_domain(&self, parent: &str) -> String {
        let name = unique_name("child");
        self.admin
            .create_domain(&name, Some(parent))
            .expect("create child domain");
        name
    }

    /// The authenticatable class used for [`TestFixture::user`].
    pub fn user_class(&self) -> &str {
        &self.user_class
    }

    /// A new class with the given custom permissions registered.
    pub fn class(&self, authenticatable: bool, permissions: &[&str]) -> String {
        let name = unique_name(if authenticatable { "Login" } else { "Thing" });
        self.admin
            .create_resource_class(&name, authenticatable, false)
            .expect("create resource class");
        for permission in permissions {
            self.admin
                .create_resource_permission(&name, permission)
                .expect("create resource permission");
        }
        name
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    /// A new authenticatable resource whose password is [`USER_PASSWORD`].
    pub fn user(&self, domain: &str) -> Resource {
        self.admin
            .create_resource(&self.user_class, domain, Some(&password(USER_PASSWORD)))
            .expect("create user")
    }

    /// A new resource of an unauthenticatable `class`.
    pub fn resource(&self, class: &str, domain: &str) -> Resource {
        self.admin
            .create_resource(class, domain, None)
            .expect("create resource")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Builders
// ─────────────────────────────────────────────────────────────────────────────

/// Collect permissions into a set.
pub fn set<P: Permission>(permissions: impl IntoIterator<Item = P>) -> PermissionSet<P> {
    permissions.into_iter().collect()
}

pub fn dp(name: &str) -> DomainPermission {
    DomainPermission::new(name).expect("valid domain permission")
}

pub fn dp_g(name: &str) -> DomainPermission {
    DomainPermission::with_grant(name).expect("valid domain permission")
}

pub fn rp(name: &str) -> ResourcePermission {
    ResourcePermission::new(name).expect("valid resource permission")
}

pub fn rp_g(name: &str) -> ResourcePermission {
    ResourcePermission::with_grant(name).expect("valid resource permission")
}

/// `*CREATE` plus the given post-create domain permissions.
pub fn domain_create(
    post: impl IntoIterator<Item = DomainPermission>,
) -> PermissionSet<DomainCreatePermission> {
    std::iter::once(DomainCreatePermission::create())
        .chain(post.into_iter().map(DomainCreatePermission::post_create))
        .collect()
}

/// `*CREATE` plus the given post-create resource permissions.
pub fn resource_create(
    post: impl IntoIterator<Item = ResourcePermission>,
) -> PermissionSet<ResourceCreatePermission> {
    std::iter::once(ResourceCreatePermission::create())
        .chain(post.into_iter().map(ResourceCreatePermission::post_create))
        .collect()
}
