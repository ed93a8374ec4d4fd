//! Session transitions, permission checks and lookups.

use std::collections::BTreeSet;

use tracing::{debug, info};
use warden_auth::SessionError;
use warden_core::{
    DomainCreatePermission, DomainPermission, Password, Permission, PermissionSet, Resource,
    ResourceClassInfo, ResourceCreatePermission, ResourcePermission,
};
use warden_store::{PermissionKind, PermissionTarget, Store, StoreExt};

use crate::api::{AccessControl, ClassPermissionsMap, DomainPermissionsMap};
use crate::context::{non_empty, AccessControlContext};
use crate::error::{AccessError, Result};

impl<S: Store> AccessControlContext<S> {
    /// Become the system resource without credentials. Only reachable
    /// through [`crate::Warden::install_authenticated`].
    pub(crate) fn authenticate_system(&mut self, resource: Resource) -> Result<()> {
        if !self.is_system(resource) {
            return Err(AccessError::not_authorized(format!(
                "resource {} may not authenticate without credentials",
                resource
            )));
        }
        if let Some(current) = self.session.authenticated_resource() {
            return Err(SessionError::AlreadyAuthenticated(current).into());
        }
        self.store().require_resource(resource)?;
        self.session.authenticate(resource)?;
        info!(resource = %resource, "authenticated system resource");
        Ok(())
    }

    fn holds_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<bool> {
        if self.is_system(accessor) {
            return Ok(true);
        }
        Ok(self
            .resolver()
            .domain_permissions(accessor, domain)?
            .has_all(required))
    }

    fn holds_domain_create_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainCreatePermission>,
    ) -> Result<bool> {
        if self.is_system(accessor) {
            return Ok(true);
        }
        Ok(self
            .resolver()
            .domain_create_permissions(accessor)?
            .has_all(required))
    }

    fn holds_post_create_domain_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<bool> {
        if self.is_system(accessor) {
            return Ok(true);
        }
        let held = self.resolver().domain_create_permissions(accessor)?;
        Ok(held.has(&DomainCreatePermission::create())
            && required
                .iter()
                .all(|permission| held.has(&DomainCreatePermission::post_create(permission.clone()))))
    }

    fn holds_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool> {
        if self.is_system(accessor) {
            return Ok(true);
        }
        Ok(self
            .resolver()
            .resource_permissions(accessor, accessed)?
            .has_all(required))
    }

    fn holds_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &ResourceClassInfo,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool> {
        if self.is_system(accessor) {
            return Ok(true);
        }
        Ok(self
            .resolver()
            .global_resource_permissions(accessor, class, domain)?
            .has_all(required))
    }

    fn holds_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &ResourceClassInfo,
        domain: &str,
        required: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<bool> {
        if self.is_system(accessor) {
            return Ok(true);
        }
        Ok(self
            .resolver()
            .resource_create_permissions(accessor, class, domain)?
            .has_all(required))
    }

    fn holds_post_create_resource_permissions(
        &self,
        accessor: Resource,
        class: &ResourceClassInfo,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool> {
        if self.is_system(accessor) {
            return Ok(true);
        }
        let held = self
            .resolver()
            .resource_create_permissions(accessor, class, domain)?;
        Ok(held.has(&ResourceCreatePermission::create())
            && required.iter().all(|permission| {
                held.has(&ResourceCreatePermission::post_create(permission.clone()))
            }))
    }

    /// Direct sets of `accessor` on every target of `kind`, split by
    /// (domain, class).
    fn class_scoped_direct<P: Permission>(
        &self,
        accessor: Resource,
        kind: PermissionKind,
    ) -> Result<ClassPermissionsMap<P>> {
        let mut map = ClassPermissionsMap::<P>::new();
        for target in self.store().permission_targets(accessor, kind)? {
            let (class, domain) = match &target {
                PermissionTarget::Global { class, domain }
                | PermissionTarget::ResourceCreate { class, domain } => {
                    (class.clone(), domain.clone())
                }
                _ => continue,
            };
            let set: PermissionSet<P> = self.resolver().direct(accessor, &target)?;
            if !set.is_empty() {
                map.entry(domain).or_default().insert(class, set);
            }
        }
        Ok(map)
    }
}

impl<S: Store> AccessControl for AccessControlContext<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    fn authenticate(&mut self, resource: Resource, password: &Password) -> Result<()> {
        if let Some(current) = self.session.authenticated_resource() {
            return Err(SessionError::AlreadyAuthenticated(current).into());
        }
        let record = self.store().require_resource(resource)?;
        let class = self.store().require_resource_class(&record.class)?;
        if !class.authenticatable {
            return Err(AccessError::invalid(format!(
                "resource {} is of class {}, which is not authenticatable",
                resource, class.name
            )));
        }

        let matched = self
            .registry()
            .check_password(Some(password.expose()), record.credential.as_deref())?;
        if !matched {
            debug!(resource = %resource, "credential mismatch");
            return Err(AccessError::Authentication(format!(
                "invalid credentials for resource {}",
                resource
            )));
        }

        self.session.authenticate(resource)?;
        info!(resource = %resource, "authenticated");
        Ok(())
    }

    fn unauthenticate(&mut self) -> Result<()> {
        let previous = self.session.authenticated_resource();
        self.session.unauthenticate()?;
        if let Some(previous) = previous {
            info!(resource = %previous, "unauthenticated");
        }
        Ok(())
    }

    fn impersonate(&mut self, resource: Resource) -> Result<()> {
        let authenticated = match self.session.session_resource() {
            None => return Err(SessionError::NotAuthenticated.into()),
            Some(session) if self.session.is_impersonating() => {
                return Err(SessionError::AlreadyImpersonating(session).into())
            }
            Some(authenticated) => authenticated,
        };

        let class = self.class_of(resource)?;
        if !class.authenticatable {
            return Err(AccessError::invalid(format!(
                "resource {} is of class {}, which is not authenticatable",
                resource, class.name
            )));
        }

        if !self.is_system(authenticated) {
            let impersonate = ResourcePermission::new(ResourcePermission::IMPERSONATE)?;
            let held = self.resolver().resource_permissions(authenticated, resource)?;
            if !held.has(&impersonate) {
                debug!(authenticated = %authenticated, resource = %resource, "denied: impersonate");
                return Err(AccessError::not_authorized(format!(
                    "{} does not hold {} on {}",
                    authenticated,
                    ResourcePermission::IMPERSONATE,
                    resource
                )));
            }
        }

        self.session.impersonate(resource)?;
        info!(authenticated = %authenticated, session = %resource, "impersonating");
        Ok(())
    }

    fn unimpersonate(&mut self) -> Result<()> {
        self.session.unimpersonate()?;
        Ok(())
    }

    fn authenticated_resource(&self) -> Result<Resource> {
        self.session
            .authenticated_resource()
            .ok_or(AccessError::InvalidState(SessionError::NotAuthenticated))
    }

    fn session_resource(&self) -> Result<Resource> {
        self.caller()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Domain Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<bool> {
        non_empty(required)?;
        let required = self.canonical_domain_set(required)?;
        let domain = self.domain_name(domain)?;
        if !self.query_allowed(accessor)? {
            return Ok(false);
        }
        self.holds_domain_permissions(accessor, &domain, &required)
    }

    fn assert_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<()> {
        non_empty(required)?;
        let required = self.canonical_domain_set(required)?;
        let domain = self.domain_name(domain)?;
        self.authorize_query(accessor)?;
        if !self.holds_domain_permissions(accessor, &domain, &required)? {
            return Err(self.missing(accessor, &required, PermissionTarget::Domain(domain)));
        }
        Ok(())
    }

    fn get_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
    ) -> Result<PermissionSet<DomainPermission>> {
        let domain = self.domain_name(domain)?;
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .direct(accessor, &PermissionTarget::Domain(domain))?)
    }

    fn get_domain_permissions_map(&self, accessor: Resource) -> Result<DomainPermissionsMap> {
        self.authorize_query(accessor)?;
        let mut map = DomainPermissionsMap::new();
        for target in self
            .store()
            .permission_targets(accessor, PermissionKind::Domain)?
        {
            let PermissionTarget::Domain(domain) = &target else {
                continue;
            };
            let set: PermissionSet<DomainPermission> = self.resolver().direct(accessor, &target)?;
            if !set.is_empty() {
                map.insert(domain.clone(), set);
            }
        }
        Ok(map)
    }

    fn get_effective_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
    ) -> Result<PermissionSet<DomainPermission>> {
        let domain = self.domain_name(domain)?;
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .domain_permissions(accessor, &domain)?
            .into_set())
    }

    fn get_effective_domain_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<DomainPermissionsMap> {
        self.authorize_query(accessor)?;
        Ok(self.resolver().domain_permissions_map(accessor)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Domain-Create Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_domain_create_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainCreatePermission>,
    ) -> Result<bool> {
        non_empty(required)?;
        let required = self.canonical_domain_create_set(required)?;
        if !self.query_allowed(accessor)? {
            return Ok(false);
        }
        self.holds_domain_create_permissions(accessor, &required)
    }

    fn assert_domain_create_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainCreatePermission>,
    ) -> Result<()> {
        non_empty(required)?;
        let required = self.canonical_domain_create_set(required)?;
        self.authorize_query(accessor)?;
        if !self.holds_domain_create_permissions(accessor, &required)? {
            return Err(self.missing(accessor, &required, PermissionTarget::DomainCreate));
        }
        Ok(())
    }

    fn has_post_create_domain_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<bool> {
        non_empty(required)?;
        let required = self.canonical_domain_set(required)?;
        if !self.query_allowed(accessor)? {
            return Ok(false);
        }
        self.holds_post_create_domain_permissions(accessor, &required)
    }

    fn assert_post_create_domain_permissions(
        &self,
        accessor: Resource,
        required: &PermissionSet<DomainPermission>,
    ) -> Result<()> {
        non_empty(required)?;
        let required = self.canonical_domain_set(required)?;
        self.authorize_query(accessor)?;
        if !self.holds_post_create_domain_permissions(accessor, &required)? {
            return Err(self.missing(accessor, &required, "a newly created domain"));
        }
        Ok(())
    }

    fn get_domain_create_permissions(
        &self,
        accessor: Resource,
    ) -> Result<PermissionSet<DomainCreatePermission>> {
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .direct(accessor, &PermissionTarget::DomainCreate)?)
    }

    fn get_effective_domain_create_permissions(
        &self,
        accessor: Resource,
    ) -> Result<PermissionSet<DomainCreatePermission>> {
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .domain_create_permissions(accessor)?
            .into_set())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool> {
        non_empty(required)?;
        let class = self.class_of(accessed)?;
        let required = self.canonical_resource_set(&class, required)?;
        if !self.query_allowed(accessor)? {
            return Ok(false);
        }
        self.holds_resource_permissions(accessor, accessed, &required)
    }

    fn assert_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<()> {
        non_empty(required)?;
        let class = self.class_of(accessed)?;
        let required = self.canonical_resource_set(&class, required)?;
        self.authorize_query(accessor)?;
        if !self.holds_resource_permissions(accessor, accessed, &required)? {
            return Err(self.missing(accessor, &required, PermissionTarget::Resource(accessed)));
        }
        Ok(())
    }

    fn get_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
    ) -> Result<PermissionSet<ResourcePermission>> {
        self.store().require_resource(accessed)?;
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .direct(accessor, &PermissionTarget::Resource(accessed))?)
    }

    fn get_effective_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
    ) -> Result<PermissionSet<ResourcePermission>> {
        self.store().require_resource(accessed)?;
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .resource_permissions(accessor, accessed)?
            .into_set())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Global Resource Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool> {
        non_empty(required)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let required = self.canonical_resource_set(&class, required)?;
        if !self.query_allowed(accessor)? {
            return Ok(false);
        }
        self.holds_global_resource_permissions(accessor, &class, &domain, &required)
    }

    fn assert_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<()> {
        non_empty(required)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let required = self.canonical_resource_set(&class, required)?;
        self.authorize_query(accessor)?;
        if !self.holds_global_resource_permissions(accessor, &class, &domain, &required)? {
            let target = PermissionTarget::Global {
                class: class.name,
                domain,
            };
            return Err(self.missing(accessor, &required, target));
        }
        Ok(())
    }

    fn get_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourcePermission>> {
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        self.authorize_query(accessor)?;
        let target = PermissionTarget::Global {
            class: class.name,
            domain,
        };
        Ok(self.resolver().direct(accessor, &target)?)
    }

    fn get_global_resource_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourcePermission>> {
        self.authorize_query(accessor)?;
        self.class_scoped_direct(accessor, PermissionKind::Global)
    }

    fn get_effective_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourcePermission>> {
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .global_resource_permissions(accessor, &class, &domain)?
            .into_set())
    }

    fn get_effective_global_resource_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourcePermission>> {
        self.authorize_query(accessor)?;
        Ok(self.resolver().global_resource_permissions_map(accessor)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resource-Create Permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn has_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<bool> {
        non_empty(required)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let required = self.canonical_resource_create_set(&class, required)?;
        if !self.query_allowed(accessor)? {
            return Ok(false);
        }
        self.holds_resource_create_permissions(accessor, &class, &domain, &required)
    }

    fn assert_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<()> {
        non_empty(required)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let required = self.canonical_resource_create_set(&class, required)?;
        self.authorize_query(accessor)?;
        if !self.holds_resource_create_permissions(accessor, &class, &domain, &required)? {
            let target = PermissionTarget::ResourceCreate {
                class: class.name,
                domain,
            };
            return Err(self.missing(accessor, &required, target));
        }
        Ok(())
    }

    fn has_post_create_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<bool> {
        non_empty(required)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let required = self.canonical_resource_set(&class, required)?;
        if !self.query_allowed(accessor)? {
            return Ok(false);
        }
        self.holds_post_create_resource_permissions(accessor, &class, &domain, &required)
    }

    fn assert_post_create_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        required: &PermissionSet<ResourcePermission>,
    ) -> Result<()> {
        non_empty(required)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let required = self.canonical_resource_set(&class, required)?;
        self.authorize_query(accessor)?;
        if !self.holds_post_create_resource_permissions(accessor, &class, &domain, &required)? {
            let target = format!("a newly created {} resource in {}", class.name, domain);
            return Err(self.missing(accessor, &required, target));
        }
        Ok(())
    }

    fn get_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourceCreatePermission>> {
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        self.authorize_query(accessor)?;
        let target = PermissionTarget::ResourceCreate {
            class: class.name,
            domain,
        };
        Ok(self.resolver().direct(accessor, &target)?)
    }

    fn get_resource_create_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourceCreatePermission>> {
        self.authorize_query(accessor)?;
        self.class_scoped_direct(accessor, PermissionKind::ResourceCreate)
    }

    fn get_effective_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
    ) -> Result<PermissionSet<ResourceCreatePermission>> {
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        self.authorize_query(accessor)?;
        Ok(self
            .resolver()
            .resource_create_permissions(accessor, &class, &domain)?
            .into_set())
    }

    fn get_effective_resource_create_permissions_map(
        &self,
        accessor: Resource,
    ) -> Result<ClassPermissionsMap<ResourceCreatePermission>> {
        self.authorize_query(accessor)?;
        Ok(self.resolver().resource_create_permissions_map(accessor)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    fn get_domain_name_by_resource(&self, resource: Resource) -> Result<String> {
        Ok(self.store().require_resource(resource)?.domain)
    }

    fn get_domain_descendants(&self, domain: &str) -> Result<BTreeSet<String>> {
        let domain = self.domain_name(domain)?;
        Ok(self.store().domain_descendants(&domain)?)
    }

    fn get_resource_class_info(&self, class: &str) -> Result<ResourceClassInfo> {
        self.class_info(class)
    }

    fn get_resource_class_info_by_resource(&self, resource: Resource) -> Result<ResourceClassInfo> {
        self.class_of(resource)
    }

    fn get_resource_class_names(&self) -> Result<Vec<String>> {
        Ok(self.store().resource_class_names()?)
    }

    fn get_resource_permission_names(&self, class: &str) -> Result<Vec<String>> {
        let class = self.class_info(class)?;
        Ok(self.store().resource_permission_names(&class.name)?)
    }

    fn get_resources_by_resource_permission(
        &self,
        accessor: Resource,
        class: &str,
        permission: &ResourcePermission,
        domain: Option<&str>,
    ) -> Result<Vec<Resource>> {
        let class = self.class_info(class)?;
        let permission = self.canonical_resource_permission(&class, permission)?;
        let domain = domain.map(|domain| self.domain_name(domain)).transpose()?;
        self.authorize_query(accessor)?;

        if !self.is_system(accessor) {
            return Ok(self.resolver().resources_by_permission(
                accessor,
                &class,
                &permission,
                domain.as_deref(),
            )?);
        }

        // The system resource holds everything on every resource.
        let scope = match &domain {
            Some(domain) => Some(self.store().domain_descendants(domain)?),
            None => None,
        };
        let mut found = Vec::new();
        for candidate in self.store().resources_of_class(&class.name)? {
            let record = self.store().require_resource(candidate)?;
            if scope.as_ref().map_or(true, |scope| scope.contains(&record.domain)) {
                found.push(candidate);
            }
        }
        Ok(found)
    }

    fn get_accessor_resources_by_resource_permission(
        &self,
        accessed: Resource,
        class: &str,
        permission: &ResourcePermission,
    ) -> Result<Vec<Resource>> {
        let accessor_class = self.class_info(class)?;
        let accessed_class = self.class_of(accessed)?;
        let permission = self.canonical_resource_permission(&accessed_class, permission)?;
        self.authorize_query(accessed)?;
        Ok(self
            .resolver()
            .accessors_by_permission(accessed, &accessor_class, &permission)?)
    }
}
