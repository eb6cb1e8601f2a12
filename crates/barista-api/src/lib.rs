//! Barista API crate - axum HTTP server and route handlers.
//!
//! Exposes the chat endpoints, the forced single-tool product and outlet
//! endpoints, session management, tool discovery and health checks.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
