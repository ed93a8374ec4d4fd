//! Creation, deletion and permission assignment.

use tracing::{info, warn};
use warden_core::{
    normalize_name, DomainCreatePermission, DomainPermission, Password, Permission,
    PermissionRow, PermissionSet, Resource, ResourceClassInfo, ResourceCreatePermission,
    ResourcePermission, ValidationError,
};
use warden_store::{PermissionTarget, Store, StoreExt};

use crate::api::AccessAdministration;
use crate::context::AccessControlContext;
use crate::error::{AccessError, Result};

impl<S: Store> AccessAdministration for AccessControlContext<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Classes and Domains
    // ─────────────────────────────────────────────────────────────────────────

    fn create_resource_class(
        &self,
        name: &str,
        authenticatable: bool,
        unauthenticated_create_allowed: bool,
    ) -> Result<()> {
        let name = normalize_name(name, "resource class")?;
        self.require_system_caller("create resource classes")?;
        self.store().create_resource_class(&ResourceClassInfo::new(
            name.clone(),
            authenticatable,
            unauthenticated_create_allowed,
        ))?;
        info!(class = %name, authenticatable, unauthenticated_create_allowed, "created resource class");
        Ok(())
    }

    fn create_resource_permission(&self, class: &str, permission: &str) -> Result<()> {
        let permission = normalize_name(permission, "permission")?;
        if permission.starts_with('*') {
            return Err(AccessError::invalid(format!(
                "custom permission {} may not start with *",
                permission
            )));
        }
        let class = self.class_info(class)?;
        self.require_system_caller("create resource permissions")?;

        let registered = self.store().resource_permission_names(&class.name)?;
        if registered
            .iter()
            .any(|name| self.matching().matches(name, &permission))
        {
            return Err(AccessError::invalid(format!(
                "permission {} already exists for resource class {}",
                permission, class.name
            )));
        }
        self.store()
            .create_resource_permission(&class.name, &permission)?;
        info!(class = %class.name, permission = %permission, "created resource permission");
        Ok(())
    }

    fn create_domain(&self, name: &str, parent: Option<&str>) -> Result<()> {
        let name = normalize_name(name, "domain")?;
        let parent = parent.map(|parent| self.domain_name(parent)).transpose()?;
        let caller = self.caller()?;

        let post_create = if self.is_system(caller) {
            PermissionSet::new()
        } else {
            let held = self.resolver().domain_create_permissions(caller)?;
            if !held.has(&DomainCreatePermission::create()) {
                return Err(AccessError::not_authorized(format!(
                    "{} does not hold {} for domains",
                    caller,
                    DomainCreatePermission::CREATE
                )));
            }
            if let Some(parent) = &parent {
                let create_child = DomainPermission::new(DomainPermission::CREATE_CHILD_DOMAIN)?;
                if !self
                    .resolver()
                    .domain_permissions(caller, parent)?
                    .has(&create_child)
                {
                    return Err(AccessError::not_authorized(format!(
                        "{} does not hold {} on {}",
                        caller,
                        DomainPermission::CREATE_CHILD_DOMAIN,
                        parent
                    )));
                }
            }
            held.set()
                .iter()
                .filter_map(|permission| permission.post_create_permission().cloned())
                .collect::<PermissionSet<DomainPermission>>()
        };

        if post_create.is_empty() {
            self.store().create_domain(&name, parent.as_deref())?;
        } else {
            let rows: Vec<PermissionRow> = post_create.iter().map(Permission::to_row).collect();
            self.store()
                .create_domain_with_permissions(&name, parent.as_deref(), caller, &rows)?;
        }
        info!(
            domain = %name,
            parent = ?parent,
            creator = %caller,
            granted = post_create.len(),
            "created domain"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    fn create_resource(
        &self,
        class: &str,
        domain: &str,
        password: Option<&Password>,
    ) -> Result<Resource> {
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        match (class.authenticatable, password.is_some()) {
            (true, false) => {
                return Err(AccessError::invalid(format!(
                    "resources of class {} require credentials",
                    class.name
                )))
            }
            (false, true) => {
                return Err(AccessError::invalid(format!(
                    "resources of class {} do not accept credentials",
                    class.name
                )))
            }
            _ => {}
        }

        let creator = match self.session.session_resource() {
            None if !class.unauthenticated_create_allowed => {
                return Err(AccessError::not_authorized(format!(
                    "resources of class {} may not be created without authentication",
                    class.name
                )));
            }
            None => None,
            Some(caller) if self.is_system(caller) => None,
            Some(caller) => {
                let held = self
                    .resolver()
                    .resource_create_permissions(caller, &class, &domain)?;
                if !held.has(&ResourceCreatePermission::create()) {
                    return Err(AccessError::not_authorized(format!(
                        "{} does not hold {} for {} resources in {}",
                        caller,
                        ResourceCreatePermission::CREATE,
                        class.name,
                        domain
                    )));
                }
                if held.is_absorbed() {
                    None
                } else {
                    let post_create = held
                        .set()
                        .iter()
                        .filter_map(|permission| permission.post_create_permission().cloned())
                        .collect::<PermissionSet<ResourcePermission>>();
                    Some((caller, post_create))
                }
            }
        };

        let credential = match password {
            Some(password) => self
                .registry()
                .encrypt_password(Some(password.expose()))?,
            None => None,
        };
        let resource = match creator {
            Some((creator, post_create)) if !post_create.is_empty() => {
                let rows: Vec<PermissionRow> =
                    post_create.iter().map(Permission::to_row).collect();
                self.store().create_resource_with_permissions(
                    &class.name,
                    &domain,
                    credential.as_deref(),
                    creator,
                    &rows,
                )?
            }
            _ => self
                .store()
                .create_resource(&class.name, &domain, credential.as_deref())?,
        };
        info!(resource = %resource, class = %class.name, domain = %domain, "created resource");
        Ok(resource)
    }

    fn set_credentials(&self, resource: Resource, password: &Password) -> Result<()> {
        let caller = self.caller()?;
        let class = self.class_of(resource)?;
        if !class.authenticatable {
            return Err(AccessError::invalid(format!(
                "resources of class {} do not accept credentials",
                class.name
            )));
        }

        let self_service = caller == resource && !self.session.is_impersonating();
        if !self.is_system(caller) && !self_service {
            let reset = ResourcePermission::new(ResourcePermission::RESET_CREDENTIALS)?;
            if !self.resolver().resource_permissions(caller, resource)?.has(&reset) {
                return Err(AccessError::not_authorized(format!(
                    "{} does not hold {} on {}",
                    caller,
                    ResourcePermission::RESET_CREDENTIALS,
                    resource
                )));
            }
        }

        let credential = self
            .registry()
            .encrypt_password(Some(password.expose()))?;
        self.store().set_credential(resource, credential.as_deref())?;
        info!(resource = %resource, caller = %caller, "replaced credentials");
        Ok(())
    }

    fn delete_resource(&self, resource: Resource) -> Result<()> {
        let caller = self.caller()?;
        if self.is_system(resource) {
            return Err(AccessError::invalid("the system resource cannot be deleted"));
        }
        self.store().require_resource(resource)?;

        if !self.is_system(caller) {
            let delete = ResourcePermission::new(ResourcePermission::DELETE)?;
            if !self.resolver().resource_permissions(caller, resource)?.has(&delete) {
                return Err(AccessError::not_authorized(format!(
                    "{} does not hold {} on {}",
                    caller,
                    ResourcePermission::DELETE,
                    resource
                )));
            }
        }

        self.store().delete_resource(resource)?;
        info!(resource = %resource, caller = %caller, "deleted resource");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Assignment
    // ─────────────────────────────────────────────────────────────────────────

    fn set_domain_permissions(
        &self,
        accessor: Resource,
        domain: &str,
        permissions: &PermissionSet<DomainPermission>,
    ) -> Result<()> {
        let requested = self.canonical_domain_set(permissions)?;
        let domain = self.domain_name(domain)?;
        self.store().require_resource(accessor)?;

        self.replace(
            accessor,
            PermissionTarget::Domain(domain.clone()),
            &requested,
            |caller| Ok(self.resolver().domain_permissions(caller, &domain)?),
        )
    }

    fn set_domain_create_permissions(
        &self,
        accessor: Resource,
        permissions: &PermissionSet<DomainCreatePermission>,
    ) -> Result<()> {
        let requested = self.canonical_domain_create_set(permissions)?;
        self.store().require_resource(accessor)?;

        self.replace(accessor, PermissionTarget::DomainCreate, &requested, |caller| {
            Ok(self.resolver().domain_create_permissions(caller)?)
        })
    }

    fn set_resource_permissions(
        &self,
        accessor: Resource,
        accessed: Resource,
        permissions: &PermissionSet<ResourcePermission>,
    ) -> Result<()> {
        self.store().require_resource(accessor)?;
        let class = self.class_of(accessed)?;
        let requested = self.canonical_resource_set(&class, permissions)?;

        if requested.contains_key(ResourcePermission::INHERIT)
            && self.resolver().would_inherit_cycle(accessor, accessed)?
        {
            warn!(accessor = %accessor, accessed = %accessed, "rejected inheritance cycle");
            return Err(ValidationError::InheritanceCycle {
                accessor: accessor.to_string(),
                target: accessed.to_string(),
            }
            .into());
        }

        self.replace(
            accessor,
            PermissionTarget::Resource(accessed),
            &requested,
            |caller| Ok(self.resolver().resource_permissions(caller, accessed)?),
        )
    }

    fn set_global_resource_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        permissions: &PermissionSet<ResourcePermission>,
    ) -> Result<()> {
        self.store().require_resource(accessor)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let requested = self.canonical_resource_set(&class, permissions)?;
        if requested.contains_key(ResourcePermission::INHERIT) {
            return Err(AccessError::invalid(format!(
                "{} cannot be assigned as a global resource permission",
                ResourcePermission::INHERIT
            )));
        }

        let target = PermissionTarget::Global {
            class: class.name.clone(),
            domain: domain.clone(),
        };
        self.replace(accessor, target, &requested, |caller| {
            Ok(self
                .resolver()
                .global_resource_permissions(caller, &class, &domain)?)
        })
    }

    fn set_resource_create_permissions(
        &self,
        accessor: Resource,
        class: &str,
        domain: &str,
        permissions: &PermissionSet<ResourceCreatePermission>,
    ) -> Result<()> {
        self.store().require_resource(accessor)?;
        let class = self.class_info(class)?;
        let domain = self.domain_name(domain)?;
        let requested = self.canonical_resource_create_set(&class, permissions)?;

        let target = PermissionTarget::ResourceCreate {
            class: class.name.clone(),
            domain: domain.clone(),
        };
        self.replace(accessor, target, &requested, |caller| {
            Ok(self
                .resolver()
                .resource_create_permissions(caller, &class, &domain)?)
        })
    }
}
