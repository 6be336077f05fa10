use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use taskpilot_core::config::KnowledgeConfig;

use crate::chunker::chunk_document;
use crate::embedding::EmbeddingFunction;
use crate::store::{ChunkMetadata, ChunkRecord, CollectionSpec, StoreError, VectorStore};

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not read knowledge source `{path}`: {source}")]
    Load { path: PathBuf, source: std::io::Error },
    #[error("knowledge collection `{collection}` has not been indexed")]
    NotIndexed { collection: String },
    #[error("indexing failed: {0}")]
    Index(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error(
        "knowledge collection `{collection}` was indexed with `{stored}` but the configured \
         embedding model is `{current}`; run `taskpilot index --reload`"
    )]
    ModelMismatch { collection: String, stored: String, current: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeSettings {
    pub collection: String,
    pub chunk_size: usize,
}

impl From<&KnowledgeConfig> for KnowledgeSettings {
    fn from(config: &KnowledgeConfig) -> Self {
        Self { collection: config.collection.clone(), chunk_size: config.chunk_size }
    }
}

/// Chunks, embeds and indexes one source document into a named collection.
pub struct KnowledgeBase {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingFunction>,
    settings: KnowledgeSettings,
}

impl KnowledgeBase {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingFunction>,
        settings: KnowledgeSettings,
    ) -> Self {
        Self { store, embedder, settings }
    }

    pub fn collection(&self) -> &str {
        &self.settings.collection
    }

    /// Indexes `path` and returns the number of chunks. Re-loading the same
    /// document overwrites chunks with the same positional ids.
    pub async fn load(&self, path: &Path) -> Result<usize, KnowledgeError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| KnowledgeError::Load { path: path.to_path_buf(), source })?;

        let chunks = chunk_document(&content, self.settings.chunk_size);
        let embeddings = self
            .embedder
            .embed(&chunks)
            .await
            .map_err(|error| KnowledgeError::Index(error.to_string()))?;
        if embeddings.len() != chunks.len() {
            return Err(KnowledgeError::Index(format!(
                "embedding function returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let spec = CollectionSpec {
            name: self.settings.collection.clone(),
            embedding_model: self.embedder.model_name().to_owned(),
        };
        let stored_model =
            self.store.collection_model(&spec.name).await.map_err(index_error)?;
        if let Some(stored) = stored_model.filter(|stored| *stored != spec.embedding_model) {
            // Vectors from another model are not comparable; rebuild from scratch.
            warn!(
                event_name = "knowledge.load.model_changed",
                collection = %spec.name,
                stored_model = %stored,
                current_model = %spec.embedding_model,
                "embedding model changed; dropping collection before indexing"
            );
            self.store.delete_collection(&spec.name).await.map_err(index_error)?;
        }
        self.store.create_or_get_collection(&spec).await.map_err(index_error)?;

        let source = source_tag(path);
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (document, embedding))| ChunkRecord {
                id: format!("chunk_{chunk_index}"),
                document,
                metadata: ChunkMetadata { source: source.clone(), chunk_index },
                embedding,
            })
            .collect();
        let chunk_count = records.len();
        self.store.upsert(&self.settings.collection, records).await.map_err(index_error)?;

        info!(
            event_name = "knowledge.load.completed",
            collection = %self.settings.collection,
            source = %source,
            chunk_count,
            "knowledge source indexed"
        );

        Ok(chunk_count)
    }

    /// Drops the collection and indexes `path` from scratch.
    pub async fn reload(&self, path: &Path) -> Result<usize, KnowledgeError> {
        let removed =
            self.store.delete_collection(&self.settings.collection).await.map_err(index_error)?;
        info!(
            event_name = "knowledge.reload.dropped",
            collection = %self.settings.collection,
            removed,
            "knowledge collection dropped before reload"
        );
        self.load(path).await
    }

    /// Up to `k` chunk texts, most similar first.
    pub async fn try_query(&self, text: &str, k: usize) -> Result<Vec<String>, KnowledgeError> {
        let collection = &self.settings.collection;
        let Some(stored) =
            self.store.collection_model(collection).await.map_err(retrieval_error)?
        else {
            return Err(KnowledgeError::NotIndexed { collection: collection.clone() });
        };
        let current = self.embedder.model_name();
        if stored != current {
            return Err(KnowledgeError::ModelMismatch {
                collection: collection.clone(),
                stored,
                current: current.to_owned(),
            });
        }

        let mut embeddings = self
            .embedder
            .embed(&[text.to_owned()])
            .await
            .map_err(|error| KnowledgeError::Retrieval(error.to_string()))?;
        let Some(embedding) = embeddings.pop() else {
            return Err(KnowledgeError::Retrieval(
                "embedding function returned no vector for the query".to_owned(),
            ));
        };

        let hits = self.store.query(collection, &embedding, k).await.map_err(|error| match error {
            StoreError::MissingCollection(collection) => KnowledgeError::NotIndexed { collection },
            other => retrieval_error(other),
        })?;

        Ok(hits.into_iter().map(|hit| hit.document).collect())
    }

    /// Like [`Self::try_query`], but any failure yields an empty list.
    pub async fn query(&self, text: &str, k: usize) -> Vec<String> {
        match self.try_query(text, k).await {
            Ok(chunks) => chunks,
            Err(KnowledgeError::NotIndexed { collection }) => {
                warn!(
                    event_name = "knowledge.query.not_indexed",
                    collection = %collection,
                    "query issued before the knowledge base was indexed"
                );
                Vec::new()
            }
            Err(error @ KnowledgeError::ModelMismatch { .. }) => {
                warn!(
                    event_name = "knowledge.query.model_mismatch",
                    collection = %self.settings.collection,
                    error = %error,
                    "collection must be reindexed before it can be searched"
                );
                Vec::new()
            }
            Err(error) => {
                warn!(
                    event_name = "knowledge.query.failed",
                    collection = %self.settings.collection,
                    error = %error,
                    "knowledge retrieval failed; continuing without context"
                );
                Vec::new()
            }
        }
    }

    pub async fn is_indexed(&self) -> Result<bool, KnowledgeError> {
        self.store.collection_exists(&self.settings.collection).await.map_err(retrieval_error)
    }

    /// Chunk count of the collection, or `None` when it does not exist.
    pub async fn indexed_chunk_count(&self) -> Result<Option<usize>, KnowledgeError> {
        if !self.is_indexed().await? {
            return Ok(None);
        }
        let count = self.store.count(&self.settings.collection).await.map_err(retrieval_error)?;
        Ok(Some(count))
    }
}

fn source_tag(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn index_error(error: StoreError) -> KnowledgeError {
    KnowledgeError::Index(error.to_string())
}

fn retrieval_error(error: StoreError) -> KnowledgeError {
    KnowledgeError::Retrieval(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::{KnowledgeBase, KnowledgeError, KnowledgeSettings};
    use crate::embedding::{EmbeddingError, EmbeddingFunction, HashingEmbedder};
    use crate::store::{InMemoryVectorStore, VectorStore};

    const SOP: &str = "\
Expense Policy Overview. All purchases need a receipt.

Equipment Purchases. Laptop purchases such as a MacBook must use the corporate card and need IT approval.

Software Subscriptions. SaaS tools require a security review before purchase.

Travel Booking. Flights must be booked two weeks ahead through the travel portal.";

    fn settings(chunk_size: usize) -> KnowledgeSettings {
        KnowledgeSettings { collection: "sop_knowledge_base".to_owned(), chunk_size }
    }

    fn knowledge_base(store: Arc<dyn VectorStore>, chunk_size: usize) -> KnowledgeBase {
        KnowledgeBase::new(store, Arc::new(HashingEmbedder::default()), settings(chunk_size))
    }

    fn write_sop(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("sop_expenses.txt");
        fs::write(&path, SOP).expect("write sop");
        path
    }

    /// Reports the default hashing model name so it passes the model check.
    struct FailingEmbedder(String);

    impl FailingEmbedder {
        fn new() -> Self {
            Self(HashingEmbedder::default().model_name().to_owned())
        }
    }

    #[async_trait]
    impl EmbeddingFunction for FailingEmbedder {
        fn model_name(&self) -> &str {
            &self.0
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Transport("connection refused".to_owned()))
        }
    }

    #[tokio::test]
    async fn load_indexes_chunks_with_positional_ids() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_sop(&dir);
        let store = Arc::new(InMemoryVectorStore::default());
        let knowledge = knowledge_base(store.clone(), 120);

        let count = knowledge.load(&path).await.expect("load");

        assert_eq!(count, 4);
        assert_eq!(store.count("sop_knowledge_base").await.expect("count"), 4);
        assert_eq!(knowledge.indexed_chunk_count().await.expect("count"), Some(4));
    }

    #[tokio::test]
    async fn loading_twice_is_idempotent() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_sop(&dir);
        let knowledge = knowledge_base(Arc::new(InMemoryVectorStore::default()), 120);

        let first_count = knowledge.load(&path).await.expect("first load");
        let first = knowledge.try_query("corporate card laptop", 3).await.expect("query");
        let second_count = knowledge.load(&path).await.expect("second load");
        let second = knowledge.try_query("corporate card laptop", 3).await.expect("query");

        assert_eq!(first_count, second_count);
        assert_eq!(first, second);
        assert_eq!(knowledge.indexed_chunk_count().await.expect("count"), Some(first_count));
    }

    #[tokio::test]
    async fn query_returns_most_similar_chunk_first() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_sop(&dir);
        let knowledge = knowledge_base(Arc::new(InMemoryVectorStore::default()), 120);
        knowledge.load(&path).await.expect("load");

        let chunks = knowledge.query("Which card should I use for laptop purchases?", 3).await;

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].contains("MacBook"), "unexpected top chunk: {}", chunks[0]);
    }

    #[tokio::test]
    async fn query_before_load_is_empty_but_distinguishable() {
        let knowledge = knowledge_base(Arc::new(InMemoryVectorStore::default()), 500);

        assert!(knowledge.query("anything", 3).await.is_empty());
        assert!(matches!(
            knowledge.try_query("anything", 3).await,
            Err(KnowledgeError::NotIndexed { collection }) if collection == "sop_knowledge_base"
        ));
        assert_eq!(knowledge.indexed_chunk_count().await.expect("count"), None);
    }

    #[tokio::test]
    async fn unreadable_source_is_a_load_error() {
        let knowledge = knowledge_base(Arc::new(InMemoryVectorStore::default()), 500);
        let missing = Path::new("/definitely/not/here/sop.txt");

        let error = knowledge.load(missing).await.expect_err("missing file");
        assert!(matches!(error, KnowledgeError::Load { ref path, .. } if path == missing));
        assert!(!knowledge.is_indexed().await.expect("exists"));
    }

    #[tokio::test]
    async fn embedding_failure_at_query_time_is_a_retrieval_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_sop(&dir);
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::default());
        knowledge_base(store.clone(), 120).load(&path).await.expect("load");

        let broken = KnowledgeBase::new(store, Arc::new(FailingEmbedder::new()), settings(120));

        assert!(matches!(
            broken.try_query("card", 3).await,
            Err(KnowledgeError::Retrieval(message)) if message.contains("connection refused")
        ));
        assert!(broken.query("card", 3).await.is_empty());
    }

    #[tokio::test]
    async fn reload_drops_stale_chunks() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_sop(&dir);
        let knowledge = knowledge_base(Arc::new(InMemoryVectorStore::default()), 120);
        assert_eq!(knowledge.load(&path).await.expect("load"), 4);

        fs::write(&path, "Only one rule remains.").expect("rewrite sop");
        assert_eq!(knowledge.load(&path).await.expect("plain load keeps stale ids"), 1);
        assert_eq!(knowledge.indexed_chunk_count().await.expect("count"), Some(4));

        assert_eq!(knowledge.reload(&path).await.expect("reload"), 1);
        assert_eq!(knowledge.indexed_chunk_count().await.expect("count"), Some(1));
    }

    #[tokio::test]
    async fn query_with_a_different_embedding_model_asks_for_reindex() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_sop(&dir);
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::default());
        KnowledgeBase::new(store.clone(), Arc::new(HashingEmbedder::new(384)), settings(120))
            .load(&path)
            .await
            .expect("load");

        let switched =
            KnowledgeBase::new(store, Arc::new(HashingEmbedder::new(64)), settings(120));

        let error = switched.try_query("corporate card laptop", 3).await.expect_err("mismatch");
        assert!(matches!(
            &error,
            KnowledgeError::ModelMismatch { stored, current, .. }
                if stored == "hashing-bow-384" && current == "hashing-bow-64"
        ));
        assert!(error.to_string().contains("taskpilot index --reload"));
        assert!(switched.query("corporate card laptop", 3).await.is_empty());
    }

    #[tokio::test]
    async fn load_with_a_different_embedding_model_rebuilds_the_collection() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_sop(&dir);
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::default());
        KnowledgeBase::new(store.clone(), Arc::new(HashingEmbedder::new(384)), settings(120))
            .load(&path)
            .await
            .expect("load with 384 dims");

        fs::write(&path, "Laptop purchases such as a MacBook must use the corporate card.")
            .expect("rewrite sop");
        let switched =
            KnowledgeBase::new(store.clone(), Arc::new(HashingEmbedder::new(64)), settings(120));
        assert_eq!(switched.load(&path).await.expect("load with 64 dims"), 1);

        assert_eq!(switched.indexed_chunk_count().await.expect("count"), Some(1));
        assert_eq!(
            store.collection_model("sop_knowledge_base").await.expect("model").as_deref(),
            Some("hashing-bow-64")
        );
        let chunks = switched.try_query("Which card for a MacBook?", 3).await.expect("query");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("corporate card"));
    }
}
