//! Embedding service trait and implementations.
//!
//! `TokenHashEmbedding` is a deterministic bag-of-tokens embedder: every
//! normalized token is hashed to a signed slot in a fixed-width vector.
//! Texts sharing vocabulary land close together under cosine similarity,
//! which is all the product search needs offline.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;

use barista_core::error::BaristaError;

/// Service for generating text embeddings.
///
/// Used for both indexing (product catalog) and search (user queries).
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, BaristaError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Whether `text` carries anything to embed. Text that fails this check
    /// is not an embedder failure.
    fn can_embed(&self, text: &str) -> bool {
        !text.trim().is_empty()
    }
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every `EmbeddingService`
/// automatically implements `DynEmbeddingService`.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, BaristaError>> + Send + 'a>>;

    fn dimensions(&self) -> usize;

    fn can_embed(&self, text: &str) -> bool;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, BaristaError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn can_embed(&self, text: &str) -> bool {
        EmbeddingService::can_embed(self, text)
    }
}

// ---------------------------------------------------------------------------
// TokenHashEmbedding
// ---------------------------------------------------------------------------

/// Words too common to carry meaning for product matching.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "do", "does", "for", "have", "i", "is", "me", "of", "on",
    "or", "show", "the", "to", "what", "which", "with", "you", "your",
];

#[derive(Debug, Clone)]
pub struct TokenHashEmbedding {
    dimensions: usize,
}

impl TokenHashEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Lowercase alphanumeric tokens with stopwords removed and a naive
    /// plural fold ("mugs" -> "mug").
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .filter(|t| !STOPWORDS.contains(&t.as_str()))
            .map(|t| {
                if t.len() > 3 && t.ends_with('s') && !t.ends_with("ss") {
                    t[..t.len() - 1].to_string()
                } else {
                    t
                }
            })
            .collect()
    }

    fn vectorize(&self, tokens: &[String]) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimensions];
        for token in tokens {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let slot = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            result[slot] += sign;
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

impl Default for TokenHashEmbedding {
    fn default() -> Self {
        Self::new(512)
    }
}

impl EmbeddingService for TokenHashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BaristaError> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return Err(BaristaError::Embedding(
                "Cannot embed text without tokens".to_string(),
            ));
        }
        Ok(self.vectorize(&tokens))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn can_embed(&self, text: &str) -> bool {
        !Self::tokenize(text).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_dimension_matches_config() {
        let service = TokenHashEmbedding::new(512);
        let vec = service.embed("ceramic mug").await.unwrap();
        assert_eq!(vec.len(), 512);
        assert_eq!(EmbeddingService::dimensions(&service), 512);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let service = TokenHashEmbedding::default();
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_unit_length() {
        let service = TokenHashEmbedding::default();
        let v = service.embed("stainless steel tumbler").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let service = TokenHashEmbedding::default();
        let query = service.embed("What coffee mugs do you have?").await.unwrap();
        let mug = service.embed("Ceramic Coffee Mug 350ml").await.unwrap();
        let bottle = service.embed("Frozee Cold Bottle 600ml").await.unwrap();
        assert!(cosine(&query, &mug) > cosine(&query, &bottle));
    }

    #[tokio::test]
    async fn test_stopwords_only_is_error() {
        let service = TokenHashEmbedding::default();
        assert!(service.embed("").await.is_err());
        assert!(service.embed("what do you have?").await.is_err());
        assert!(!EmbeddingService::can_embed(&service, "what do you have?"));
        assert!(EmbeddingService::can_embed(&service, "ceramic mug"));
    }

    #[test]
    fn test_tokenize_folds_plurals() {
        assert_eq!(
            TokenHashEmbedding::tokenize("Mugs, Glass & cups!"),
            vec!["mug", "glass", "cup"]
        );
    }

    #[tokio::test]
    async fn test_dyn_dispatch() {
        let service: Box<dyn DynEmbeddingService> = Box::new(TokenHashEmbedding::new(64));
        let v = service.embed_boxed("tumbler").await.unwrap();
        assert_eq!(v.len(), 64);
        assert_eq!(service.dimensions(), 64);
    }
}
