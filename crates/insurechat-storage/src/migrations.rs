//! Database schema migrations.
//!
//! Applies the key-value schema and tracks applied versions in
//! `schema_migrations`.

use rusqlite::Connection;
use tracing::info;

use insurechat_core::error::InsureChatError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), InsureChatError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| InsureChatError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            InsureChatError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: kv_store");
    }

    Ok(())
}

/// Version 1: string-keyed value table.
fn apply_v1(conn: &Connection) -> Result<(), InsureChatError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            key         TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'kv_store');
        ",
    )
    .map_err(|e| InsureChatError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_once() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        // Running again should be idempotent.
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_kv_store_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES ('k', 'v', 1700000000)",
            [],
        )
        .unwrap();

        let value: String = conn
            .query_row("SELECT value FROM kv_store WHERE key = 'k'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(value, "v");
    }

    #[test]
    fn test_kv_store_key_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES ('k', 'a', 1)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES ('k', 'b', 2)",
            [],
        );
        assert!(dup.is_err());
    }
}
