use std::sync::Arc;

use taskpilot_core::config::{EmbeddingConfig, EmbeddingProvider, KnowledgeConfig};

use crate::connection::connect_with_settings;
use crate::embedding::{EmbeddingError, EmbeddingFunction, HashingEmbedder, HttpEmbedder};
use crate::knowledge_base::{KnowledgeBase, KnowledgeError};
use crate::migrations::run_pending;
use crate::store::{InMemoryVectorStore, SqliteVectorStore, StoreError, VectorStore};

pub const MEMORY_STORE_URL: &str = "memory://";

/// Opens the configured store, applying migrations for SQLite.
pub async fn open_store(config: &KnowledgeConfig) -> Result<Arc<dyn VectorStore>, StoreError> {
    if config.store_url.trim() == MEMORY_STORE_URL {
        return Ok(Arc::new(InMemoryVectorStore::default()));
    }

    let pool =
        connect_with_settings(&config.store_url, config.max_connections, config.timeout_secs)
            .await?;
    run_pending(&pool)
        .await
        .map_err(|error| StoreError::Database(sqlx::Error::Migrate(Box::new(error))))?;
    Ok(Arc::new(SqliteVectorStore::new(pool)))
}

pub fn build_embedder(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingFunction>, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        EmbeddingProvider::OpenAi => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                EmbeddingError::InvalidResponse("embedding.base_url is not configured".to_owned())
            })?;
            let embedder = HttpEmbedder::new(
                base_url,
                config.model.clone(),
                config.api_key.clone(),
                config.timeout_secs,
            )?;
            Ok(Arc::new(embedder))
        }
    }
}

pub async fn open_knowledge_base(
    knowledge: &KnowledgeConfig,
    embedding: &EmbeddingConfig,
) -> Result<KnowledgeBase, KnowledgeError> {
    let store = open_store(knowledge)
        .await
        .map_err(|error| KnowledgeError::Index(format!("vector store unavailable: {error}")))?;
    let embedder = build_embedder(embedding)
        .map_err(|error| KnowledgeError::Index(format!("embedding function unavailable: {error}")))?;
    Ok(KnowledgeBase::new(store, embedder, knowledge.into()))
}
