//! Application state shared across all route handlers.
//!
//! AppState holds the turn executor (and through it the session store and
//! tool registry) plus the configuration the handlers read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use barista_chat::{build_reasoner, InMemorySessionStore, SessionStore, ToolRegistry, TurnExecutor};
use barista_core::config::BaristaConfig;
use barista_core::error::BaristaError;
use barista_storage::{Database, OutletRepository, ProductRepository, TextToSqlService};
use barista_vector::{ProductSearch, TokenHashEmbedding};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BaristaConfig>,
    pub executor: Arc<TurnExecutor>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: BaristaConfig, executor: TurnExecutor) -> Self {
        Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            start_time: Instant::now(),
        }
    }

    /// Wire repositories, the product index, the tool registry, the
    /// reasoner and an empty session store on top of `database`.
    ///
    /// Every product already in the catalog is embedded and indexed.
    pub async fn initialize(config: BaristaConfig, database: Arc<Database>) -> Result<Self, BaristaError> {
        let catalog = Arc::new(ProductRepository::new(Arc::clone(&database)));
        let outlets = Arc::new(OutletRepository::new(Arc::clone(&database)));

        let search = ProductSearch::new(
            TokenHashEmbedding::new(config.search.embedding_dim),
            config.search.clone(),
        );
        let indexed = search.index_products(&catalog.all()?).await?;
        tracing::info!(indexed, "Product index ready");

        let registry = ToolRegistry::new(
            Arc::new(search),
            catalog,
            Arc::new(TextToSqlService::with_templates(outlets)),
        );
        let reasoner = build_reasoner(&config.reasoner)
            .map_err(|e| BaristaError::Config(e.to_string()))?;
        tracing::info!(backend = %config.reasoner.backend, "Reasoner ready");

        let store: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::new(config.session.expiry_minutes));
        let executor = TurnExecutor::new(store, Arc::new(registry), reasoner, &config.agent)
            .with_sweep_on_request(config.session.sweep_on_request);

        Ok(Self::new(config, executor))
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        self.executor.store()
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.turn_timeout_secs)
    }
}
