use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("collection `{0}` does not exist")]
    MissingCollection(String),
    #[error("embedding dimension mismatch: stored {stored}, query {query}")]
    DimensionMismatch { stored: usize, query: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub embedding_model: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredChunk {
    pub id: String,
    pub document: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Named collections of embedded chunks with nearest-neighbour lookup.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_or_get_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError>;
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;
    /// Embedding model recorded when the collection was created, `None` if absent.
    async fn collection_model(&self, name: &str) -> Result<Option<String>, StoreError>;
    /// Returns whether a collection was removed.
    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError>;
    /// Inserts chunks, overwriting any existing chunk with the same id.
    async fn upsert(&self, collection: &str, chunks: Vec<ChunkRecord>) -> Result<(), StoreError>;
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;
    async fn count(&self, collection: &str) -> Result<usize, StoreError>;
}

pub fn cosine_similarity(stored: &[f32], query: &[f32]) -> Result<f32, StoreError> {
    if stored.len() != query.len() {
        return Err(StoreError::DimensionMismatch { stored: stored.len(), query: query.len() });
    }

    let dot: f32 = stored.iter().zip(query).map(|(a, b)| a * b).sum();
    let stored_norm = stored.iter().map(|value| value * value).sum::<f32>().sqrt();
    let query_norm = query.iter().map(|value| value * value).sum::<f32>().sqrt();
    if stored_norm == 0.0 || query_norm == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (stored_norm * query_norm))
}

/// Most similar first; ties keep document order.
pub(crate) fn rank(mut scored: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    scored.sort_by(|left, right| {
        right.score.total_cmp(&left.score).then(left.chunk_index.cmp(&right.chunk_index))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::{cosine_similarity, rank, ScoredChunk, StoreError};

    fn scored(id: &str, chunk_index: usize, score: f32) -> ScoredChunk {
        ScoredChunk { id: id.to_owned(), document: id.to_owned(), chunk_index, score }
    }

    #[test]
    fn cosine_handles_unnormalised_and_zero_vectors() {
        let score = cosine_similarity(&[2.0, 0.0], &[5.0, 0.0]).expect("same dims");
        assert!((score - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).expect("same dims"), 0.0);
        assert!(matches!(
            cosine_similarity(&[1.0], &[1.0, 0.0]),
            Err(StoreError::DimensionMismatch { stored: 1, query: 2 })
        ));
    }

    #[test]
    fn rank_orders_by_score_then_position() {
        let ranked = rank(
            vec![scored("c", 2, 0.5), scored("a", 0, 0.9), scored("b", 1, 0.5), scored("d", 3, 0.1)],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|chunk| chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
