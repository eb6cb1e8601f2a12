//! Barista Vector crate - embedding service, in-memory index, and product search.
//!
//! Products are embedded once at startup and held in a brute-force cosine
//! index; queries are embedded with the same service and ranked against it.

pub mod embedding;
pub mod index;
pub mod search;

pub use embedding::{DynEmbeddingService, EmbeddingService, TokenHashEmbedding};
pub use index::{SearchHit, VectorIndex};
pub use search::{ProductMatch, ProductSearch};
