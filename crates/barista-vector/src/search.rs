//! Product similarity search.
//!
//! `ProductSearch` embeds the catalog into a [`VectorIndex`] and answers
//! `similar_products` queries with the same embedding service.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use barista_core::config::SearchConfig;
use barista_core::error::BaristaError;
use barista_storage::Product;

use crate::embedding::{DynEmbeddingService, EmbeddingService};
use crate::index::VectorIndex;

/// A product ranked against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub id: i64,
    pub content: Value,
    pub similarity_score: f64,
}

pub struct ProductSearch {
    index: Arc<VectorIndex>,
    embedder: Box<dyn DynEmbeddingService>,
    config: SearchConfig,
}

impl ProductSearch {
    pub fn new(embedder: impl EmbeddingService + 'static, config: SearchConfig) -> Self {
        Self::new_dyn(Box::new(embedder), config)
    }

    pub fn new_dyn(embedder: Box<dyn DynEmbeddingService>, config: SearchConfig) -> Self {
        let index = Arc::new(VectorIndex::new(embedder.dimensions()));
        Self {
            index,
            embedder,
            config,
        }
    }

    /// Embed and index every product. Products that fail to embed are
    /// skipped. Returns the number indexed.
    pub async fn index_products(&self, products: &[Product]) -> Result<usize, BaristaError> {
        let mut indexed = 0;
        for product in products {
            match self.embedder.embed_boxed(&product.embedding_text()).await {
                Ok(vector) => {
                    self.index.insert(product.id, vector, product.content())?;
                    indexed += 1;
                }
                Err(e) => {
                    warn!(product_id = product.id, error = %e, "Skipping product that failed to embed");
                }
            }
        }
        info!(indexed, total = products.len(), "Product index built");
        Ok(indexed)
    }

    /// Products most similar to `query`, best first.
    ///
    /// `top_k` falls back to the configured default and is clamped to
    /// `1..=max_top_k`. Hits below `min_similarity` are dropped. A query
    /// with no searchable terms matches nothing.
    pub async fn similar_products(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ProductMatch>, BaristaError> {
        let k = top_k
            .unwrap_or(self.config.default_top_k)
            .clamp(1, self.config.max_top_k.max(1));

        if !self.embedder.can_embed(query) {
            debug!(query, "Query has no searchable terms");
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed_boxed(query)
            .await
            .map_err(|e| BaristaError::Search(format!("Query embedding failed: {}", e)))?;

        let hits = self.index.search(&query_vec, k, self.config.min_similarity)?;
        debug!(query, k, hits = hits.len(), "Product search complete");

        Ok(hits
            .into_iter()
            .map(|hit| ProductMatch {
                id: hit.id,
                content: hit.content,
                similarity_score: hit.score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
