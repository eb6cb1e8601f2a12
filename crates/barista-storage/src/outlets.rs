//! Outlet directory repository.
//!
//! Besides typed inserts and seeding, exposes `query_rows` which runs an
//! arbitrary read-only statement and returns rows as JSON objects keyed by
//! column name. The text-to-SQL service is the only caller of that path.

use std::path::Path;
use std::sync::Arc;

use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use barista_core::error::BaristaError;

use crate::db::Database;

/// One result row, column name to JSON value.
pub type SqlRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub opening_hours: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutlet {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub opening_hours: String,
}

pub struct OutletRepository {
    db: Arc<Database>,
}

impl OutletRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn insert(&self, outlet: &NewOutlet) -> Result<i64, BaristaError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO outlets (name, address, opening_hours) VALUES (?1, ?2, ?3)",
                rusqlite::params![outlet.name, outlet.address, outlet.opening_hours],
            )
            .map_err(|e| BaristaError::Storage(e.to_string()))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list(&self) -> Result<Vec<Outlet>, BaristaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, address, opening_hours FROM outlets ORDER BY name")
                .map_err(|e| BaristaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(Outlet {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        address: row.get(2)?,
                        opening_hours: row.get(3)?,
                    })
                })
                .map_err(|e| BaristaError::Storage(e.to_string()))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| BaristaError::Storage(e.to_string()))
        })
    }

    pub fn count(&self) -> Result<u64, BaristaError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM outlets", [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| BaristaError::Storage(e.to_string()))
        })
    }

    /// Load outlets from a JSON array file, skipping names already present.
    pub fn load_seed(&self, path: &Path) -> Result<usize, BaristaError> {
        let contents = std::fs::read_to_string(path)?;
        let outlets: Vec<NewOutlet> = serde_json::from_str(&contents)?;

        let existing: Vec<String> = self.list()?.into_iter().map(|o| o.name).collect();
        let mut added = 0;
        for outlet in &outlets {
            if existing.contains(&outlet.name) {
                debug!(name = %outlet.name, "Outlet already exists, skipping");
                continue;
            }
            self.insert(outlet)?;
            added += 1;
        }

        info!(count = added, path = %path.display(), "Seeded outlets");
        Ok(added)
    }

    /// Run a statement and collect every row as a JSON object.
    ///
    /// Callers are responsible for checking that `sql` is read-only.
    pub fn query_rows(&self, sql: &str) -> Result<Vec<SqlRow>, BaristaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| BaristaError::Storage(e.to_string()))?;

            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            let mut rows = stmt
                .query([])
                .map_err(|e| BaristaError::Storage(e.to_string()))?;

            let mut out = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| BaristaError::Storage(e.to_string()))?
            {
                let mut record = SqlRow::new();
                for (idx, column) in columns.iter().enumerate() {
                    let value = row
                        .get_ref(idx)
                        .map_err(|e| BaristaError::Storage(e.to_string()))?;
                    record.insert(column.clone(), value_to_json(value));
                }
                out.push(record);
            }
            Ok(out)
        })
    }
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::from(format!("<{} bytes>", b.len())),
    }
}
