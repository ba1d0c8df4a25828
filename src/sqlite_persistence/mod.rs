//! Shared SQLite persistence infrastructure.
//!
//! Both databases used by the service (the commerce read-model and the
//! service's own state database) are described by versioned schemas that are
//! created on first open, validated on every subsequent open, and migrated
//! forward when the stored version lags behind the latest one.

mod versioned_schema;

pub use versioned_schema::{Column, SqlType, Table, VersionedSchema, BASE_DB_VERSION};

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Failure talking to one of the SQLite databases.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Open a database file, creating it with the latest schema when it does not
/// exist yet, and validating/migrating it when it does.
pub fn open_database(path: &Path, schemas: &[VersionedSchema], label: &str) -> Result<Connection> {
    let is_new_db = !path.exists();
    let latest = schemas
        .last()
        .with_context(|| format!("No schema versions defined for {} database", label))?;

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open {} database at {:?}", label, path))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    if is_new_db {
        info!("Creating new {} database at {:?}", label, path);
        latest.create(&conn)?;
        return Ok(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version < 1 {
        anyhow::bail!(
            "{} database version {} is invalid (expected >= 1)",
            label,
            db_version
        );
    }

    let schema = schemas
        .iter()
        .find(|s| s.version == db_version as usize)
        .with_context(|| format!("Unknown {} database version {}", label, db_version))?;
    schema.validate(&conn).with_context(|| {
        format!(
            "{} database schema validation failed for version {}",
            label, db_version
        )
    })?;

    if (db_version as usize) < latest.version {
        info!(
            "Migrating {} database from version {} to {}",
            label, db_version, latest.version
        );
        migrate(&mut conn, schemas, db_version as usize)?;
    }

    Ok(conn)
}

fn migrate(conn: &mut Connection, schemas: &[VersionedSchema], from_version: usize) -> Result<()> {
    let tx = conn.transaction()?;
    let mut latest_applied = from_version;
    for schema in schemas.iter().filter(|s| s.version > from_version) {
        if let Some(migration_fn) = schema.migration {
            migration_fn(&tx)
                .with_context(|| format!("Failed to run migration to version {}", schema.version))?;
        }
        latest_applied = schema.version;
    }
    tx.execute_batch(&format!(
        "PRAGMA user_version = {};",
        BASE_DB_VERSION + latest_applied
    ))?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_column;
    use tempfile::TempDir;

    const V1_TABLE: Table = Table {
        name: "things",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("name", &SqlType::Text, non_null = true),
        ],
        indices: &[],
        unique_constraints: &[],
    };

    const V2_TABLE: Table = Table {
        name: "gadgets",
        columns: &[
            sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
            sqlite_column!("label", &SqlType::Text, non_null = true),
        ],
        indices: &[],
        unique_constraints: &[],
    };

    fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE gadgets (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
            [],
        )?;
        Ok(())
    }

    const SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 1,
            tables: &[V1_TABLE],
            migration: None,
        },
        VersionedSchema {
            version: 2,
            tables: &[V1_TABLE, V2_TABLE],
            migration: Some(migrate_v1_to_v2),
        },
    ];

    #[test]
    fn test_open_creates_latest_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        let conn = open_database(&path, SCHEMAS, "test").unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 2);

        // Both tables exist
        conn.execute("INSERT INTO things (name) VALUES ('a')", [])
            .unwrap();
        conn.execute("INSERT INTO gadgets (label) VALUES ('b')", [])
            .unwrap();
    }

    #[test]
    fn test_open_migrates_older_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        // Create a v1 database by hand
        {
            let conn = Connection::open(&path).unwrap();
            SCHEMAS[0].create(&conn).unwrap();
        }

        let conn = open_database(&path, SCHEMAS, "test").unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 2);
        conn.execute("INSERT INTO gadgets (label) VALUES ('b')", [])
            .unwrap();
    }

    #[test]
    fn test_open_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(&format!("PRAGMA user_version = {};", BASE_DB_VERSION + 42))
                .unwrap();
        }

        let result = open_database(&path, SCHEMAS, "test");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown test database version"));
    }

    #[test]
    fn test_open_rejects_foreign_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        // A database without our version marker
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE unrelated (id INTEGER PRIMARY KEY)", [])
                .unwrap();
        }

        let result = open_database(&path, SCHEMAS, "test");
        assert!(result.is_err());
    }
}
