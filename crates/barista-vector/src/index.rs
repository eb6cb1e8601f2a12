//! In-memory vector index with brute-force cosine similarity search.
//!
//! The product catalog is small enough that an O(n) scan per query is
//! cheaper than maintaining a graph index.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use barista_core::error::BaristaError;

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: i64,
    /// Cosine similarity score (-1.0 to 1.0).
    pub score: f64,
    pub content: Value,
}

#[derive(Debug, Clone)]
struct VectorEntry {
    embedding: Vec<f32>,
    content: Value,
}

/// Thread-safe via interior RwLock; clones share the same entries.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Arc<RwLock<HashMap<i64, VectorEntry>>>,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Insert a vector with its payload. Overwrites any entry with the same id.
    pub fn insert(&self, id: i64, embedding: Vec<f32>, content: Value) -> Result<(), BaristaError> {
        self.check_dimensions(&embedding)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|e| BaristaError::Search(format!("Lock poisoned: {}", e)))?;
        entries.insert(id, VectorEntry { embedding, content });
        Ok(())
    }

    /// Return the `k` entries most similar to `query` with a score of at
    /// least `min_score`, best first. Ties are broken by ascending id.
    pub fn search(&self, query: &[f32], k: usize, min_score: f64) -> Result<Vec<SearchHit>, BaristaError> {
        self.check_dimensions(query)?;
        let entries = self
            .entries
            .read()
            .map_err(|e| BaristaError::Search(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<SearchHit> = entries
            .iter()
            .filter_map(|(id, entry)| {
                let score = cosine_similarity(query, &entry.embedding);
                (score >= min_score).then(|| SearchHit {
                    id: *id,
                    score,
                    content: entry.content.clone(),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    pub fn remove(&self, id: i64) -> Result<(), BaristaError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| BaristaError::Search(format!("Lock poisoned: {}", e)))?;
        entries.remove(&id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), BaristaError> {
        if vector.len() != self.dimensions {
            return Err(BaristaError::Search(format!(
                "Vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit(dim: usize, slot: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[slot] = 1.0;
        v
    }

    #[test]
    fn test_search_orders_by_score() {
        let index = VectorIndex::new(4);
        index.insert(1, vec![1.0, 0.0, 0.0, 0.0], json!({"name": "exact"})).unwrap();
        index.insert(2, vec![1.0, 1.0, 0.0, 0.0], json!({"name": "close"})).unwrap();
        index.insert(3, vec![-1.0, 0.0, 0.0, 0.0], json!({"name": "opposite"})).unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 10, -1.0).unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert_eq!(hits[1].content["name"], "close");
    }

    #[test]
    fn test_min_score_filters() {
        let index = VectorIndex::new(4);
        index.insert(1, unit(4, 0), json!({})).unwrap();
        index.insert(2, unit(4, 1), json!({})).unwrap();
        index.insert(3, vec![-1.0, 0.0, 0.0, 0.0], json!({})).unwrap();

        // Orthogonal scores 0.0 and is kept at threshold 0.
        let hits = index.search(&unit(4, 0), 10, 0.0).unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_ties_break_by_id() {
        let index = VectorIndex::new(2);
        for id in [5, 3, 9] {
            index.insert(id, vec![1.0, 0.0], json!({})).unwrap();
        }
        let ids: Vec<i64> = index
            .search(&[1.0, 0.0], 10, 0.0)
            .unwrap()
            .iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }

    #[test]
    fn test_respects_k() {
        let index = VectorIndex::new(8);
        for id in 0..10 {
            index.insert(id, vec![1.0; 8], json!({})).unwrap();
        }
        assert_eq!(index.search(&[1.0; 8], 3, 0.0).unwrap().len(), 3);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let index = VectorIndex::new(8);
        assert!(index.insert(1, vec![1.0; 4], json!({})).is_err());
        assert!(index.search(&[1.0; 4], 3, 0.0).is_err());
    }

    #[test]
    fn test_insert_overwrites_and_remove() {
        let index = VectorIndex::new(2);
        index.insert(1, vec![1.0, 0.0], json!({"v": 1})).unwrap();
        index.insert(1, vec![0.0, 1.0], json!({"v": 2})).unwrap();
        assert_eq!(index.len(), 1);

        index.remove(1).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
