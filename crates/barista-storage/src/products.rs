//! Product catalog repository.

use std::path::Path;
use std::sync::Arc;

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::info;

use barista_core::error::BaristaError;

use crate::db::Database;

/// A stored catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: String,
    pub description: String,
}

impl Product {
    /// Product payload returned to callers and fed to the embedder.
    pub fn content(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "category": self.category,
            "price": self.price,
            "description": self.description,
        })
    }

    /// Flattened text used for embedding.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.name, self.category, self.description, self.price
        )
    }
}

/// A product as it appears in a seed file, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub description: String,
}

pub struct ProductRepository {
    db: Arc<Database>,
}

impl ProductRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a product and return its row id.
    pub fn insert(&self, product: &NewProduct) -> Result<i64, BaristaError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (name, category, price, description)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    product.name,
                    product.category,
                    product.price,
                    product.description,
                ],
            )
            .map_err(|e| BaristaError::Storage(e.to_string()))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<Product>, BaristaError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, category, price, description FROM products WHERE id = ?1",
                rusqlite::params![id],
                row_to_product,
            )
            .optional()
            .map_err(|e| BaristaError::Storage(e.to_string()))
        })
    }

    /// Page through the catalog in id order.
    pub fn list(&self, limit: u32, offset: u32) -> Result<Vec<Product>, BaristaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, category, price, description FROM products
                     ORDER BY id ASC LIMIT ?1 OFFSET ?2",
                )
                .map_err(|e| BaristaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit, offset], row_to_product)
                .map_err(|e| BaristaError::Storage(e.to_string()))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| BaristaError::Storage(e.to_string()))
        })
    }

    pub fn all(&self) -> Result<Vec<Product>, BaristaError> {
        self.list(u32::MAX, 0)
    }

    pub fn count(&self) -> Result<u64, BaristaError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM products", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(|e| BaristaError::Storage(e.to_string()))
        })
    }

    /// Load products from a JSON array file. Returns the number inserted.
    ///
    /// A catalog that already has rows is left untouched.
    pub fn load_seed(&self, path: &Path) -> Result<usize, BaristaError> {
        if self.count()? > 0 {
            info!(path = %path.display(), "Product catalog already populated, skipping seed");
            return Ok(0);
        }

        let contents = std::fs::read_to_string(path)?;
        let products: Vec<NewProduct> = serde_json::from_str(&contents)?;
        for product in &products {
            self.insert(product)?;
        }

        info!(count = products.len(), path = %path.display(), "Seeded products");
        Ok(products.len())
    }
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        price: row.get(3)?,
        description: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn repo() -> ProductRepository {
        ProductRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn mug(name: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: "Mugs".to_string(),
            price: "RM 39.00".to_string(),
            description: "Ceramic mug".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let repo = repo();
        let id = repo.insert(&mug("Corak Mug")).unwrap();
        let product = repo.get(id).unwrap().unwrap();
        assert_eq!(product.name, "Corak Mug");
        assert_eq!(product.category, "Mugs");
        assert!(repo.get(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_list_paginates_in_id_order() {
        let repo = repo();
        for name in ["A", "B", "C", "D"] {
            repo.insert(&mug(name)).unwrap();
        }

        let page: Vec<String> = repo
            .list(2, 1)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(page, vec!["B", "C"]);
        assert_eq!(repo.all().unwrap().len(), 4);
        assert_eq!(repo.count().unwrap(), 4);
    }

    #[test]
    fn test_content_includes_fields() {
        let repo = repo();
        let id = repo.insert(&mug("Frozee Cold Cup")).unwrap();
        let product = repo.get(id).unwrap().unwrap();
        let content = product.content();
        assert_eq!(content["name"], "Frozee Cold Cup");
        assert_eq!(content["price"], "RM 39.00");
        assert!(product.embedding_text().contains("Ceramic"));
    }

    #[test]
    fn test_load_seed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "All-Can Tumbler", "category": "Tumblers"}}, {{"name": "OG Cup"}}]"#
        )
        .unwrap();

        let repo = repo();
        assert_eq!(repo.load_seed(file.path()).unwrap(), 2);
        assert_eq!(repo.count().unwrap(), 2);

        // Second load is a no-op.
        assert_eq!(repo.load_seed(file.path()).unwrap(), 0);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_load_seed_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = repo().load_seed(file.path()).unwrap_err();
        assert!(matches!(err, BaristaError::Serialization(_)));
    }
}
