//! Barista Storage crate - SQLite persistence for products and outlets.
//!
//! Provides a WAL-mode SQLite database with migrations, repositories for
//! the product catalog and outlet directory, and the natural-language to
//! SQL service used for outlet lookups.

pub mod db;
pub mod migrations;
pub mod outlets;
pub mod products;
pub mod text_to_sql;

pub use db::Database;
pub use outlets::{NewOutlet, Outlet, OutletRepository, SqlRow};
pub use products::{NewProduct, Product, ProductRepository};
pub use text_to_sql::{
    ensure_read_only, OutletQueryError, SqlAnswer, SqlGenerator, TemplateSqlGenerator,
    TextToSqlService,
};
