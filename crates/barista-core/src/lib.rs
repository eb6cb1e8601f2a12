//! Shared foundation for the Barista assistant backend.
//!
//! Holds the layered configuration model and the top-level error type
//! that the storage, vector, chat and API crates convert into.

pub mod config;
pub mod error;

pub use config::BaristaConfig;
pub use error::{BaristaError, Result};
