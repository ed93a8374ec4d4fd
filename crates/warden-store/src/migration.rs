//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration transforms the schema
//! from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Domain forest: parent is NULL for roots
        CREATE TABLE domains (
            name TEXT PRIMARY KEY,
            parent TEXT REFERENCES domains(name)
        );

        -- Resource classes, keyed by trimmed lowercase name
        CREATE TABLE resource_classes (
            class_key TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            authenticatable INTEGER NOT NULL,
            unauthenticated_create INTEGER NOT NULL
        );

        -- Custom permission names registered per class
        CREATE TABLE resource_permission_names (
            class_key TEXT NOT NULL REFERENCES resource_classes(class_key),
            name TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (class_key, name)
        );

        -- Single-row id allocator, ids are never reused
        CREATE TABLE resource_sequence (
            next_id INTEGER NOT NULL
        );
        INSERT INTO resource_sequence (next_id) VALUES (0);

        CREATE TABLE resources (
            resource_id INTEGER PRIMARY KEY,
            class_key TEXT NOT NULL REFERENCES resource_classes(class_key),
            domain TEXT NOT NULL REFERENCES domains(name),
            credential TEXT
        );

        -- Direct permission assignments of every kind
        CREATE TABLE permissions (
            accessor_id INTEGER NOT NULL,
            kind TEXT NOT NULL,               -- PermissionKind::as_str
            target_key TEXT NOT NULL,         -- PermissionTarget::storage_key
            target_resource INTEGER,          -- set for resource targets
            target_class TEXT,                -- set for global / resource-create targets
            target_domain TEXT,               -- set for domain-scoped targets
            name TEXT NOT NULL,
            with_grant INTEGER NOT NULL,
            create_with_grant INTEGER,        -- NULL unless a create permission
            PRIMARY KEY (accessor_id, kind, target_key, name)
        );

        CREATE INDEX idx_resources_class ON resources(class_key);
        CREATE INDEX idx_permissions_target_resource ON permissions(target_resource);
        CREATE INDEX idx_domains_parent ON domains(parent);
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
