use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use super::{
    cosine_similarity, rank, ChunkRecord, CollectionSpec, ScoredChunk, StoreError, VectorStore,
};
use crate::DbPool;

/// Persistent store; embeddings are kept as JSON arrays and scored in process.
pub struct SqliteVectorStore {
    pool: DbPool,
}

impl SqliteVectorStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_or_get_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_collection (name, embedding_model, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(&spec.name)
        .bind(&spec.embedding_model)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let count = sqlx::query("SELECT COUNT(*) AS count FROM knowledge_collection WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?
            .try_get::<i64, _>("count")?;

        Ok(count > 0)
    }

    async fn collection_model(&self, name: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT embedding_model FROM knowledge_collection WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<String, _>("embedding_model")).transpose().map_err(Into::into)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM knowledge_chunk WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM knowledge_collection WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(removed > 0)
    }

    async fn upsert(&self, collection: &str, chunks: Vec<ChunkRecord>) -> Result<(), StoreError> {
        if !self.collection_exists(collection).await? {
            return Err(StoreError::MissingCollection(collection.to_owned()));
        }

        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            let embedding = serde_json::to_string(&chunk.embedding)
                .map_err(|error| StoreError::Decode(error.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO knowledge_chunk (
                    collection, id, document, source, chunk_index, embedding
                ) VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    source = excluded.source,
                    chunk_index = excluded.chunk_index,
                    embedding = excluded.embedding
                "#,
            )
            .bind(collection)
            .bind(&chunk.id)
            .bind(&chunk.document)
            .bind(&chunk.metadata.source)
            .bind(chunk.metadata.chunk_index as i64)
            .bind(embedding)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if !self.collection_exists(collection).await? {
            return Err(StoreError::MissingCollection(collection.to_owned()));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, document, chunk_index, embedding
            FROM knowledge_chunk
            WHERE collection = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| score_row(row, embedding))
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(rank(scored, k))
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        if !self.collection_exists(collection).await? {
            return Err(StoreError::MissingCollection(collection.to_owned()));
        }

        let count = sqlx::query("SELECT COUNT(*) AS count FROM knowledge_chunk WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?
            .try_get::<i64, _>("count")?;

        Ok(count.max(0) as usize)
    }
}

fn score_row(row: &SqliteRow, query: &[f32]) -> Result<ScoredChunk, StoreError> {
    let raw_embedding: String = row.try_get("embedding")?;
    let stored: Vec<f32> = serde_json::from_str(&raw_embedding)
        .map_err(|error| StoreError::Decode(format!("embedding column: {error}")))?;
    let chunk_index: i64 = row.try_get("chunk_index")?;

    Ok(ScoredChunk {
        id: row.try_get("id")?,
        document: row.try_get("document")?,
        chunk_index: usize::try_from(chunk_index)
            .map_err(|_| StoreError::Decode(format!("negative chunk_index {chunk_index}")))?,
        score: cosine_similarity(&stored, query)?,
    })
}
