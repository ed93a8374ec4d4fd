//! First-time setup of a store.

use tracing::{info, warn};
use warden_core::{normalize_name, Password, Resource, ResourceClassInfo};
use warden_store::Store;

use crate::config::ContextConfig;
use crate::error::{AccessError, Result};

/// Create the system domain, the system class and the system resource.
///
/// The system resource must be the first resource the store allocates.
/// Installing into a store that already has one fails. Every check runs
/// before the first write, and a domain or class left by an interrupted
/// install is reused, so a failed install can be retried.
pub fn install<S: Store + ?Sized>(
    store: &S,
    config: &ContextConfig,
    system_password: &Password,
) -> Result<Resource> {
    if store.resource(config.system_resource)?.is_some() {
        return Err(AccessError::invalid(format!(
            "system resource {} is already installed",
            config.system_resource
        )));
    }
    if !store.all_resources()?.is_empty() {
        return Err(AccessError::invalid(
            "the system resource must be the first resource in the store",
        ));
    }

    let domain = normalize_name(&config.system_domain, "domain")?;
    let class = normalize_name(&config.system_class, "resource class")?;
    let existing_domain = match store.domain(&domain)? {
        Some(record) if record.parent.is_some() => {
            return Err(AccessError::invalid(format!(
                "system domain {} must be a root domain",
                domain
            )))
        }
        record => record.is_some(),
    };
    let existing_class = match store.resource_class(&class)? {
        Some(info) if !info.authenticatable => {
            return Err(AccessError::invalid(format!(
                "system class {} must be authenticatable",
                info.name
            )))
        }
        info => info.is_some(),
    };
    let credential = config
        .encryptor
        .registry()
        .encrypt_password(Some(system_password.expose()))?;

    if existing_domain {
        warn!(domain = %domain, "reusing system domain from an earlier install");
    } else {
        store.create_domain(&domain, None)?;
    }
    if existing_class {
        warn!(class = %class, "reusing system class from an earlier install");
    } else {
        store.create_resource_class(&ResourceClassInfo::new(&class, true, false))?;
    }

    let resource = store.create_resource(&class, &domain, credential.as_deref())?;
    if resource != config.system_resource {
        return Err(AccessError::invalid(format!(
            "system resource was allocated as {}, expected {}",
            resource, config.system_resource
        )));
    }

    info!(resource = %resource, domain = %domain, "installed system resource");
    Ok(resource)
}
