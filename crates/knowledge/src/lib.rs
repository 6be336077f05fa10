pub mod chunker;
pub mod connection;
pub mod embedding;
pub mod factory;
pub mod knowledge_base;
pub mod lifecycle;
pub mod migrations;
pub mod store;

pub use chunker::chunk_document;
pub use connection::{connect, connect_with_settings, DbPool};
pub use embedding::{EmbeddingError, EmbeddingFunction, HashingEmbedder, HttpEmbedder};
pub use factory::{build_embedder, open_knowledge_base, open_store};
pub use knowledge_base::{KnowledgeBase, KnowledgeError, KnowledgeSettings};
pub use lifecycle::KnowledgeLifecycle;
pub use store::{
    ChunkMetadata, ChunkRecord, CollectionSpec, InMemoryVectorStore, ScoredChunk,
    SqliteVectorStore, StoreError, VectorStore,
};
