//! SQLite implementation of the Store trait.
//!
//! The primary storage backend. Uses rusqlite with bundled SQLite. Domain
//! hierarchy queries are recursive CTEs. Multi-row writes run in a single
//! transaction.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use warden_core::{class_key, PermissionRow, Resource, ResourceClassInfo};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{DomainRecord, PermissionKind, PermissionTarget, ResourceRecord, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(format!("connection mutex: {}", e)))?;
        f(&conn)
    }

    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(format!("connection mutex: {}", e)))?;
        f(&mut conn)
    }
}

fn id_param(resource: Resource) -> Result<i64> {
    i64::try_from(resource.id())
        .map_err(|_| StoreError::InvalidData(format!("resource id {} out of range", resource)))
}

fn resource_from_column(id: i64) -> Result<Resource> {
    u64::try_from(id)
        .map(Resource::from_id)
        .map_err(|_| StoreError::InvalidData(format!("negative resource id {}", id)))
}

fn domain_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM domains WHERE name = ?1", params![name], |_| Ok(()))
        .optional()?
        .is_some())
}

fn class_name(conn: &Connection, class: &str) -> Result<String> {
    conn.query_row(
        "SELECT name FROM resource_classes WHERE class_key = ?1",
        params![class_key(class)],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("resource class {}", class.trim())))
}

type TargetColumns<'a> = (Option<i64>, Option<&'a str>, Option<&'a str>);

fn target_columns(target: &PermissionTarget) -> Result<TargetColumns<'_>> {
    Ok(match target {
        PermissionTarget::Domain(domain) => (None, None, Some(domain.as_str())),
        PermissionTarget::DomainCreate => (None, None, None),
        PermissionTarget::Resource(resource) => (Some(id_param(*resource)?), None, None),
        PermissionTarget::Global { class, domain }
        | PermissionTarget::ResourceCreate { class, domain } => {
            (None, Some(class.as_str()), Some(domain.as_str()))
        }
    })
}

fn insert_domain(conn: &Connection, name: &str, parent: Option<&str>) -> Result<()> {
    if domain_exists(conn, name)? {
        return Err(StoreError::AlreadyExists(format!("domain {}", name)));
    }
    if let Some(parent) = parent {
        if !domain_exists(conn, parent)? {
            return Err(StoreError::NotFound(format!("domain {}", parent)));
        }
    }
    conn.execute(
        "INSERT INTO domains (name, parent) VALUES (?1, ?2)",
        params![name, parent],
    )?;
    Ok(())
}

fn insert_resource(
    conn: &Connection,
    class: &str,
    domain: &str,
    credential: Option<&str>,
) -> Result<Resource> {
    class_name(conn, class)?;
    if !domain_exists(conn, domain)? {
        return Err(StoreError::NotFound(format!("domain {}", domain)));
    }

    let next: i64 = conn.query_row("SELECT next_id FROM resource_sequence", [], |row| row.get(0))?;
    conn.execute("UPDATE resource_sequence SET next_id = ?1", params![next + 1])?;
    conn.execute(
        "INSERT INTO resources (resource_id, class_key, domain, credential)
         VALUES (?1, ?2, ?3, ?4)",
        params![next, class_key(class), domain, credential],
    )?;
    resource_from_column(next)
}

/// Replace the rows of one (accessor, target) pair. Callers own the transaction.
fn replace_rows(
    conn: &Connection,
    accessor: Resource,
    target: &PermissionTarget,
    rows: &[PermissionRow],
) -> Result<()> {
    let accessor = id_param(accessor)?;
    let kind = target.kind().as_str();
    let key = target.storage_key();
    let (target_resource, target_class, target_domain) = target_columns(target)?;

    conn.execute(
        "DELETE FROM permissions WHERE accessor_id = ?1 AND kind = ?2 AND target_key = ?3",
        params![accessor, kind, key],
    )?;
    let mut insert = conn.prepare(
        "INSERT INTO permissions (accessor_id, kind, target_key, target_resource,
             target_class, target_domain, name, with_grant, create_with_grant)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for row in rows {
        insert.execute(params![
            accessor,
            kind,
            key,
            target_resource,
            target_class,
            target_domain,
            row.name,
            row.with_grant,
            row.create_with_grant,
        ])?;
    }
    Ok(())
}

fn target_from_columns(
    kind: PermissionKind,
    resource: Option<i64>,
    class: Option<String>,
    domain: Option<String>,
) -> Result<PermissionTarget> {
    let missing = |column: &str| {
        StoreError::InvalidData(format!("{} permission without {}", kind.as_str(), column))
    };
    Ok(match kind {
        PermissionKind::Domain => PermissionTarget::Domain(domain.ok_or_else(|| missing("domain"))?),
        PermissionKind::DomainCreate => PermissionTarget::DomainCreate,
        PermissionKind::Resource => {
            PermissionTarget::Resource(resource_from_column(resource.ok_or_else(|| missing("resource"))?)?)
        }
        PermissionKind::Global => PermissionTarget::Global {
            class: class.ok_or_else(|| missing("class"))?,
            domain: domain.ok_or_else(|| missing("domain"))?,
        },
        PermissionKind::ResourceCreate => PermissionTarget::ResourceCreate {
            class: class.ok_or_else(|| missing("class"))?,
            domain: domain.ok_or_else(|| missing("domain"))?,
        },
    })
}

impl Store for SqliteStore {
    fn create_domain(&self, name: &str, parent: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_domain(&tx, name, parent)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn create_domain_with_permissions(
        &self,
        name: &str,
        parent: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_domain(&tx, name, parent)?;
            replace_rows(&tx, creator, &PermissionTarget::Domain(name.to_string()), rows)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn domain(&self, name: &str) -> Result<Option<DomainRecord>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT name, parent FROM domains WHERE name = ?1",
                    params![name],
                    |row| {
                        Ok(DomainRecord {
                            name: row.get(0)?,
                            parent: row.get(1)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    fn domain_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM domains ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    fn domain_ancestors(&self, name: &str) -> Result<Vec<String>> {
        let chain: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH RECURSIVE chain(name, parent, depth) AS (
                    SELECT name, parent, 0 FROM domains WHERE name = ?1
                    UNION ALL
                    SELECT d.name, d.parent, chain.depth + 1
                    FROM domains d JOIN chain ON d.name = chain.parent
                )
                SELECT name FROM chain ORDER BY depth",
            )?;
            let chain = stmt
                .query_map(params![name], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(chain)
        })?;
        if chain.is_empty() {
            return Err(StoreError::NotFound(format!("domain {}", name)));
        }
        Ok(chain)
    }

    fn domain_descendants(&self, name: &str) -> Result<BTreeSet<String>> {
        let below: BTreeSet<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH RECURSIVE below(name) AS (
                    SELECT name FROM domains WHERE name = ?1
                    UNION ALL
                    SELECT d.name FROM domains d JOIN below ON d.parent = below.name
                )
                SELECT name FROM below",
            )?;
            let below = stmt
                .query_map(params![name], |row| row.get(0))?
                .collect::<std::result::Result<BTreeSet<String>, _>>()?;
            Ok(below)
        })?;
        if below.is_empty() {
            return Err(StoreError::NotFound(format!("domain {}", name)));
        }
        Ok(below)
    }

    fn create_resource_class(&self, info: &ResourceClassInfo) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let key = class_key(&info.name);
            let exists = tx
                .query_row(
                    "SELECT 1 FROM resource_classes WHERE class_key = ?1",
                    params![key],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                return Err(StoreError::AlreadyExists(format!("resource class {}", info.name)));
            }
            tx.execute(
                "INSERT INTO resource_classes (class_key, name, authenticatable, unauthenticated_create)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    key,
                    info.name,
                    info.authenticatable,
                    info.unauthenticated_create_allowed
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn resource_class(&self, name: &str) -> Result<Option<ResourceClassInfo>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT name, authenticatable, unauthenticated_create
                     FROM resource_classes WHERE class_key = ?1",
                    params![class_key(name)],
                    |row| {
                        Ok(ResourceClassInfo {
                            name: row.get(0)?,
                            authenticatable: row.get(1)?,
                            unauthenticated_create_allowed: row.get(2)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    fn resource_class_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM resource_classes ORDER BY class_key")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    fn create_resource_permission(&self, class: &str, permission: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let name = class_name(&tx, class)?;
            let key = class_key(class);
            let exists = tx
                .query_row(
                    "SELECT 1 FROM resource_permission_names WHERE class_key = ?1 AND name = ?2",
                    params![key, permission],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                return Err(StoreError::AlreadyExists(format!(
                    "permission {} for class {}",
                    permission, name
                )));
            }
            tx.execute(
                "INSERT INTO resource_permission_names (class_key, name, position)
                 SELECT ?1, ?2, COUNT(*) FROM resource_permission_names WHERE class_key = ?1",
                params![key, permission],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn resource_permission_names(&self, class: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            class_name(conn, class)?;
            let mut stmt = conn.prepare(
                "SELECT name FROM resource_permission_names WHERE class_key = ?1 ORDER BY position",
            )?;
            let names = stmt
                .query_map(params![class_key(class)], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    fn create_resource(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
    ) -> Result<Resource> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let resource = insert_resource(&tx, class, domain, credential)?;
            tx.commit()?;
            Ok(resource)
        })
    }

    fn create_resource_with_permissions(
        &self,
        class: &str,
        domain: &str,
        credential: Option<&str>,
        creator: Resource,
        rows: &[PermissionRow],
    ) -> Result<Resource> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let resource = insert_resource(&tx, class, domain, credential)?;
            replace_rows(&tx, creator, &PermissionTarget::Resource(resource), rows)?;
            tx.commit()?;
            Ok(resource)
        })
    }

    fn resource(&self, resource: Resource) -> Result<Option<ResourceRecord>> {
        let id = id_param(resource)?;
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT c.name, r.domain, r.credential
                     FROM resources r JOIN resource_classes c ON c.class_key = r.class_key
                     WHERE r.resource_id = ?1",
                    params![id],
                    |row| {
                        Ok(ResourceRecord {
                            resource,
                            class: row.get(0)?,
                            domain: row.get(1)?,
                            credential: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    fn resources_of_class(&self, class: &str) -> Result<Vec<Resource>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT resource_id FROM resources WHERE class_key = ?1 ORDER BY resource_id",
            )?;
            let ids = stmt
                .query_map(params![class_key(class)], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids.into_iter().map(resource_from_column).collect()
        })
    }

    fn all_resources(&self) -> Result<Vec<Resource>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT resource_id FROM resources ORDER BY resource_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids.into_iter().map(resource_from_column).collect()
        })
    }

    fn set_credential(&self, resource: Resource, credential: Option<&str>) -> Result<()> {
        let id = id_param(resource)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE resources SET credential = ?2 WHERE resource_id = ?1",
                params![id, credential],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("resource {}", resource)));
            }
            Ok(())
        })
    }

    fn delete_resource(&self, resource: Resource) -> Result<()> {
        let id = id_param(resource)?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM resources WHERE resource_id = ?1",
                params![id],
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound(format!("resource {}", resource)));
            }
            tx.execute(
                "DELETE FROM permissions WHERE accessor_id = ?1 OR target_resource = ?1",
                params![id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn direct_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
    ) -> Result<Vec<PermissionRow>> {
        let accessor = id_param(accessor)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, with_grant, create_with_grant FROM permissions
                 WHERE accessor_id = ?1 AND kind = ?2 AND target_key = ?3
                 ORDER BY name",
            )?;
            let rows = stmt
                .query_map(
                    params![accessor, target.kind().as_str(), target.storage_key()],
                    |row| {
                        Ok(PermissionRow {
                            name: row.get(0)?,
                            with_grant: row.get(1)?,
                            create_with_grant: row.get(2)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn put_permissions(
        &self,
        accessor: Resource,
        target: &PermissionTarget,
        rows: &[PermissionRow],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            replace_rows(&tx, accessor, target, rows)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn permission_targets(
        &self,
        accessor: Resource,
        kind: PermissionKind,
    ) -> Result<Vec<PermissionTarget>> {
        let accessor = id_param(accessor)?;
        let columns: Vec<(Option<i64>, Option<String>, Option<String>)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT target_resource, target_class, target_domain, target_key
                 FROM permissions WHERE accessor_id = ?1 AND kind = ?2
                 ORDER BY target_key",
            )?;
            let columns = stmt
                .query_map(params![accessor, kind.as_str()], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(columns)
        })?;

        columns
            .into_iter()
            .map(|(resource, class, domain)| target_from_columns(kind, resource, class, domain))
            .collect()
    }

    fn delete_permissions_for_resource(&self, resource: Resource) -> Result<()> {
        let id = id_param(resource)?;
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM permissions WHERE accessor_id = ?1 OR target_resource = ?1",
                params![id],
            )?;
            Ok(())
        })
    }
}
