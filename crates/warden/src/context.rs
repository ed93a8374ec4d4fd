//! The shared service handle and the per-caller context.
//!
//! A [`Warden`] owns everything callers share: the store, the configuration,
//! the credential encoders and the pair locks. Each caller gets its own
//! [`AccessControlContext`] from it, carrying a private session state.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use warden_auth::{EncryptorRegistry, SessionError, SessionState};
use warden_core::{
    canonical_domain_permission, canonical_resource_permission, normalize_name,
    validate_domain_create_permissions, validate_resource_create_permissions, CreateEntry,
    CreatePermission, DomainCreatePermission, DomainPermission, NameMatching, Password,
    Permission, PermissionRow, PermissionSet, Resource, ResourceClassInfo,
    ResourceCreatePermission, ResourcePermission,
};
use warden_perms::{unauthorized_changes, EffectivePermissions, Resolver};
use warden_store::{PermissionTarget, Store, StoreExt};

use crate::bootstrap;
use crate::config::ContextConfig;
use crate::error::{AccessError, Result};
use crate::locks::PairLocks;

/// Shared entry point. Cheap to clone.
pub struct Warden<S: Store> {
    store: Arc<S>,
    config: Arc<ContextConfig>,
    registry: Arc<EncryptorRegistry>,
    locks: Arc<PairLocks>,
}

impl<S: Store> Clone for Warden<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: Store> Warden<S> {
    /// Create a service over `store`.
    pub fn new(store: S, config: ContextConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Create a service over a store that is shared with other code.
    pub fn with_shared_store(store: Arc<S>, config: ContextConfig) -> Self {
        let registry = config.encryptor.registry();
        Self {
            store,
            config: Arc::new(config),
            registry: Arc::new(registry),
            locks: Arc::new(PairLocks::new()),
        }
    }

    /// Set up the system domain, class and resource. See [`bootstrap::install`].
    pub fn install(&self, system_password: &Password) -> Result<Resource> {
        bootstrap::install(self.store.as_ref(), &self.config, system_password)
    }

    /// Install, then hand back a context already authenticated as the
    /// system resource.
    ///
    /// This is the only way to obtain a system session without its
    /// credentials. Later sessions authenticate with the system password.
    pub fn install_authenticated(
        &self,
        system_password: &Password,
    ) -> Result<AccessControlContext<S>> {
        let system = self.install(system_password)?;
        let mut context = self.context();
        context.authenticate_system(system)?;
        Ok(context)
    }

    /// A fresh, unauthenticated context.
    pub fn context(&self) -> AccessControlContext<S> {
        AccessControlContext {
            warden: self.clone(),
            session: SessionState::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn registry(&self) -> &EncryptorRegistry {
        &self.registry
    }
}

/// One caller's view: a session state plus the shared service.
///
/// Not meant to be shared between callers. Session transitions take
/// `&mut self`, everything else `&self`.
pub struct AccessControlContext<S: Store> {
    warden: Warden<S>,
    pub(crate) session: SessionState,
}

impl<S: Store> fmt::Debug for AccessControlContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControlContext")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<S: Store> AccessControlContext<S> {
    pub fn warden(&self) -> &Warden<S> {
        &self.warden
    }

    pub fn session_state(&self) -> SessionState {
        self.session
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared Handles
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn store(&self) -> &S {
        &self.warden.store
    }

    pub(crate) fn resolver(&self) -> Resolver<'_, S> {
        Resolver::new(self.warden.store.as_ref())
    }

    pub(crate) fn registry(&self) -> &EncryptorRegistry {
        &self.warden.registry
    }

    pub(crate) fn matching(&self) -> NameMatching {
        self.warden.config.name_matching
    }

    pub(crate) fn is_system(&self, resource: Resource) -> bool {
        resource == self.warden.config.system_resource
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session and Query Authorization
    // ─────────────────────────────────────────────────────────────────────────

    /// The acting resource, or `NotAuthenticated`.
    pub(crate) fn caller(&self) -> Result<Resource> {
        self.session
            .session_resource()
            .ok_or(AccessError::InvalidState(SessionError::NotAuthenticated))
    }

    /// Fail unless the session is the system resource.
    pub(crate) fn require_system_caller(&self, action: &str) -> Result<Resource> {
        let caller = self.caller()?;
        if !self.is_system(caller) {
            debug!(caller = %caller, action, "denied: system resource only");
            return Err(AccessError::not_authorized(format!(
                "only the system resource may {}",
                action
            )));
        }
        Ok(caller)
    }

    /// Whether the session may look at `accessor`'s permissions.
    pub(crate) fn query_allowed(&self, accessor: Resource) -> Result<bool> {
        self.store().require_resource(accessor)?;
        let caller = self.caller()?;
        if caller == accessor || self.is_system(caller) {
            return Ok(true);
        }
        let query = ResourcePermission::new(ResourcePermission::QUERY)?;
        Ok(self.resolver().resource_permissions(caller, accessor)?.has(&query))
    }

    pub(crate) fn authorize_query(&self, accessor: Resource) -> Result<()> {
        if self.query_allowed(accessor)? {
            return Ok(());
        }
        let caller = self.caller()?;
        debug!(caller = %caller, accessor = %accessor, "denied: query");
        Err(AccessError::not_authorized(format!(
            "{} may not query the permissions of {} without {}",
            caller,
            accessor,
            ResourcePermission::QUERY
        )))
    }

    /// The error an `assert_*` raises when `required` is not held.
    pub(crate) fn missing<P: Permission>(
        &self,
        accessor: Resource,
        required: &PermissionSet<P>,
        target: impl fmt::Display,
    ) -> AccessError {
        debug!(accessor = %accessor, target = %target, "denied: missing permissions");
        AccessError::not_authorized(format!(
            "{} does not hold {} on {}",
            accessor,
            join(required.iter()),
            target
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Argument Normalization
    // ─────────────────────────────────────────────────────────────────────────

    /// Trimmed name of an existing domain.
    pub(crate) fn domain_name(&self, raw: &str) -> Result<String> {
        let name = normalize_name(raw, "domain")?;
        self.store().require_domain(&name)?;
        Ok(name)
    }

    /// An existing resource class.
    pub(crate) fn class_info(&self, raw: &str) -> Result<ResourceClassInfo> {
        let name = normalize_name(raw, "resource class")?;
        Ok(self.store().require_resource_class(&name)?)
    }

    pub(crate) fn class_of(&self, resource: Resource) -> Result<ResourceClassInfo> {
        let record = self.store().require_resource(resource)?;
        Ok(self.store().require_resource_class(&record.class)?)
    }

    pub(crate) fn canonical_domain_set(
        &self,
        permissions: &PermissionSet<DomainPermission>,
    ) -> Result<PermissionSet<DomainPermission>> {
        let matching = self.matching();
        Ok(PermissionSet::try_from_iter(
            permissions
                .iter()
                .map(|permission| canonical_domain_permission(permission, matching)),
        )?)
    }

    pub(crate) fn canonical_domain_create_set(
        &self,
        permissions: &PermissionSet<DomainCreatePermission>,
    ) -> Result<PermissionSet<DomainCreatePermission>> {
        let matching = self.matching();
        let canonical = PermissionSet::try_from_iter(permissions.iter().map(|permission| {
            match permission.post_create_permission() {
                Some(post) => CreatePermission::new(
                    CreateEntry::PostCreate(canonical_domain_permission(post, matching)),
                    permission.is_with_grant(),
                ),
                None => permission.clone(),
            }
        }))?;
        validate_domain_create_permissions(&canonical)?;
        Ok(canonical)
    }

    pub(crate) fn canonical_resource_set(
        &self,
        class: &ResourceClassInfo,
        permissions: &PermissionSet<ResourcePermission>,
    ) -> Result<PermissionSet<ResourcePermission>> {
        let registered = self.store().resource_permission_names(&class.name)?;
        let canonical = permissions
            .iter()
            .map(|permission| {
                canonical_resource_permission(permission, class, &registered, self.matching())
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(PermissionSet::try_from_iter(canonical)?)
    }

    pub(crate) fn canonical_resource_permission(
        &self,
        class: &ResourceClassInfo,
        permission: &ResourcePermission,
    ) -> Result<ResourcePermission> {
        let registered = self.store().resource_permission_names(&class.name)?;
        Ok(canonical_resource_permission(
            permission,
            class,
            &registered,
            self.matching(),
        )?)
    }

    pub(crate) fn canonical_resource_create_set(
        &self,
        class: &ResourceClassInfo,
        permissions: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<PermissionSet<ResourceCreatePermission>> {
        let registered = self.store().resource_permission_names(&class.name)?;
        let canonical = permissions
            .iter()
            .map(|permission| match permission.post_create_permission() {
                Some(post) => canonical_resource_permission(post, class, &registered, self.matching())
                    .map(|post| {
                        CreatePermission::new(CreateEntry::PostCreate(post), permission.is_with_grant())
                    }),
                None => Ok(permission.clone()),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let canonical = PermissionSet::try_from_iter(canonical)?;
        validate_resource_create_permissions(&canonical)?;
        Ok(canonical)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the direct permissions of `accessor` on `target`.
    ///
    /// Under the pair lock: read the current direct set, check the session's
    /// grant authority over the delta with `granter`, then write.
    pub(crate) fn replace<P, F>(
        &self,
        accessor: Resource,
        target: PermissionTarget,
        requested: &PermissionSet<P>,
        granter: F,
    ) -> Result<()>
    where
        P: Permission,
        F: FnOnce(Resource) -> Result<EffectivePermissions<P>>,
    {
        let caller = self.caller()?;
        self.warden.locks.with_lock(accessor, &target, || {
            let current: PermissionSet<P> = self.resolver().direct(accessor, &target)?;

            if !self.is_system(caller) {
                let held = granter(caller)?;
                let denied = unauthorized_changes(&current, requested, &held);
                if !denied.is_empty() {
                    debug!(
                        caller = %caller,
                        accessor = %accessor,
                        target = %target,
                        denied = denied.len(),
                        "denied: grant authority"
                    );
                    return Err(AccessError::not_authorized(format!(
                        "{} lacks grant authority for {} on {}",
                        caller,
                        join(denied.iter()),
                        target
                    )));
                }
            }

            self.write_rows(accessor, &target, requested)
        })
    }

    /// Write a set without any authority check.
    pub(crate) fn write_rows<P: Permission>(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
        permissions: &PermissionSet<P>,
    ) -> Result<()> {
        let rows: Vec<PermissionRow> = permissions.iter().map(Permission::to_row).collect();
        self.store().put_permissions(accessor, target, &rows)?;
        info!(accessor = %accessor, target = %target, count = rows.len(), "replaced permissions");
        Ok(())
    }
}

/// A required set must name at least one permission.
pub(crate) fn non_empty<P: Permission>(required: &PermissionSet<P>) -> Result<()> {
    if required.is_empty() {
        return Err(AccessError::invalid("at least one permission must be specified"));
    }
    Ok(())
}

fn join<'a, P: Permission>(permissions: impl Iterator<Item = &'a P>) -> String {
    permissions
        .map(|permission| permission.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
