//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode and recommended PRAGMAs on initialization.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use barista_core::error::BaristaError;

use crate::migrations;

/// Path value selecting an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Thread-safe SQLite database wrapper.
///
/// The connection is wrapped in a Mutex since rusqlite Connection is not Sync.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self, BaristaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| BaristaError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| BaristaError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());
        Self::migrated(conn)
    }

    /// Open an in-memory database.
    pub fn in_memory() -> Result<Self, BaristaError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BaristaError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| BaristaError::Storage(format!("Failed to set pragmas: {}", e)))?;

        Self::migrated(conn)
    }

    /// Open the database named by a `storage.database_path` setting.
    pub fn open(location: &str) -> Result<Self, BaristaError> {
        if location == IN_MEMORY {
            Self::in_memory()
        } else {
            Self::new(Path::new(location))
        }
    }

    fn migrated(conn: Connection) -> Result<Self, BaristaError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, BaristaError>
    where
        F: FnOnce(&Connection) -> Result<T, BaristaError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| BaristaError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
