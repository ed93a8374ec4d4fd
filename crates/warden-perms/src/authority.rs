//! Grant authority over a requested change.
//!
//! A replacement is judged on its delta against what is currently assigned.
//! Entries kept unchanged need no authority. Every entry that is added,
//! removed or changed must be grantable from the granter's effective set.

use warden_core::{Permission, PermissionSet};

use crate::effective::EffectivePermissions;

/// Entries of the change from `current` to `requested` that `granter` may
/// not assign or revoke. Empty means the change is authorized.
pub fn unauthorized_changes<P: Permission>(
    current: &PermissionSet<P>,
    requested: &PermissionSet<P>,
    granter: &EffectivePermissions<P>,
) -> Vec<P> {
    let added = requested
        .iter()
        .filter(|permission| !current.contains(permission));
    let removed = current
        .iter()
        .filter(|permission| !requested.contains(permission));

    added
        .chain(removed)
        .filter(|permission| !granter.can_grant(permission))
        .cloned()
        .collect()
}
