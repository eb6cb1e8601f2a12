//! Database schema migrations.
//!
//! Applies the initial schema: the product catalog, the outlet directory,
//! and the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use barista_core::error::BaristaError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), BaristaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| BaristaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| BaristaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: products and outlets.
fn apply_v1(conn: &Connection) -> Result<(), BaristaError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            category    TEXT NOT NULL DEFAULT '',
            price       TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_products_category
            ON products (category);

        CREATE TABLE IF NOT EXISTS outlets (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            name           TEXT NOT NULL,
            address        TEXT NOT NULL,
            opening_hours  TEXT NOT NULL DEFAULT '',
            created_at     INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_outlets_name
            ON outlets (name);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| BaristaError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
