use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::knowledge_base::{KnowledgeBase, KnowledgeError};

/// Loads the knowledge source at most once per owner (process or web session).
///
/// A failed load leaves the cell empty, so the next call tries again.
pub struct KnowledgeLifecycle {
    knowledge: Arc<KnowledgeBase>,
    source_path: PathBuf,
    loaded: OnceCell<usize>,
}

impl KnowledgeLifecycle {
    pub fn new(knowledge: Arc<KnowledgeBase>, source_path: impl Into<PathBuf>) -> Self {
        Self { knowledge, source_path: source_path.into(), loaded: OnceCell::new() }
    }

    pub async fn ensure_loaded(&self) -> Result<usize, KnowledgeError> {
        self.loaded
            .get_or_try_init(|| self.knowledge.load(&self.source_path))
            .await
            .copied()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    pub fn loaded_chunk_count(&self) -> Option<usize> {
        self.loaded.get().copied()
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::KnowledgeLifecycle;
    use crate::embedding::{EmbeddingError, EmbeddingFunction, HashingEmbedder};
    use crate::knowledge_base::{KnowledgeBase, KnowledgeError, KnowledgeSettings};
    use crate::store::InMemoryVectorStore;

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        inner: HashingEmbedder,
    }

    #[async_trait]
    impl EmbeddingFunction for CountingEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    fn lifecycle(embedder: Arc<CountingEmbedder>, path: std::path::PathBuf) -> KnowledgeLifecycle {
        let knowledge = KnowledgeBase::new(
            Arc::new(InMemoryVectorStore::default()),
            embedder,
            KnowledgeSettings { collection: "sop_knowledge_base".to_owned(), chunk_size: 500 },
        );
        KnowledgeLifecycle::new(Arc::new(knowledge), path)
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_single_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("sop_expenses.txt");
        fs::write(&path, "Receipts are required.\n\nUse the corporate card.").expect("write");
        let embedder = Arc::new(CountingEmbedder::default());
        let lifecycle = Arc::new(lifecycle(embedder.clone(), path));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                tokio::spawn(async move { lifecycle.ensure_loaded().await })
            })
            .collect();
        for handle in handles {
            let count = handle.await.expect("join").expect("load");
            assert_eq!(count, 1);
        }

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert!(lifecycle.is_loaded());
        assert_eq!(lifecycle.loaded_chunk_count(), Some(1));
    }

    #[tokio::test]
    async fn failed_load_can_be_retried() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("sop_expenses.txt");
        let lifecycle = lifecycle(Arc::new(CountingEmbedder::default()), path.clone());

        assert!(matches!(lifecycle.ensure_loaded().await, Err(KnowledgeError::Load { .. })));
        assert!(!lifecycle.is_loaded());

        fs::write(&path, "Receipts are required.").expect("write");
        assert_eq!(lifecycle.ensure_loaded().await.expect("retry"), 1);
        assert_eq!(lifecycle.source_path(), path.as_path());
    }
}
