use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    cosine_similarity, rank, ChunkRecord, CollectionSpec, ScoredChunk, StoreError, VectorStore,
};

struct MemoryCollection {
    embedding_model: String,
    chunks: BTreeMap<String, ChunkRecord>,
}

/// Process-local store; contents vanish with the process.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_or_get_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.entry(spec.name.clone()).or_insert_with(|| MemoryCollection {
            embedding_model: spec.embedding_model.clone(),
            chunks: BTreeMap::new(),
        });
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.contains_key(name))
    }

    async fn collection_model(&self, name: &str) -> Result<Option<String>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|collection| collection.embedding_model.clone()))
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections.remove(name).is_some())
    }

    async fn upsert(&self, collection: &str, chunks: Vec<ChunkRecord>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_owned()))?;
        for chunk in chunks {
            target.chunks.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let collections = self.collections.read().await;
        let source = collections
            .get(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_owned()))?;

        let scored = source
            .chunks
            .values()
            .map(|chunk| {
                Ok(ScoredChunk {
                    id: chunk.id.clone(),
                    document: chunk.document.clone(),
                    chunk_index: chunk.metadata.chunk_index,
                    score: cosine_similarity(&chunk.embedding, embedding)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(rank(scored, k))
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|source| source.chunks.len())
            .ok_or_else(|| StoreError::MissingCollection(collection.to_owned()))
    }
}
