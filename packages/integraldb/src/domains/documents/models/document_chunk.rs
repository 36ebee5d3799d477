use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use crate::common::{ChunkId, PipelineError, Result};
use crate::config::EMBEDDING_DIMENSIONS;
use crate::domains::documents::chunking::TextChunk;

/// A stored window of a source document with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub source_document: String,
    pub chunk_index: i32,
    pub char_start: i32,
    pub char_end: i32,
    pub overlap_chars: i32,
    pub content: String,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChunkMatch {
    pub id: ChunkId,
    pub source_document: String,
    pub chunk_index: i32,
    pub content: String,
    pub similarity: f64,
    /// Supplier of the products extracted from the same document, if any
    pub supplier_name: Option<String>,
}

/// A chunk paired with its embedding, ready to insert.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
}

impl DocumentChunk {
    /// Replace every chunk of `source_document` in one transaction.
    ///
    /// Readers see either the old set or the new set, never a mix.
    #[instrument(skip(chunks, pool), fields(chunk_count = chunks.len()))]
    pub async fn replace_for_document(
        source_document: &str,
        chunks: &[EmbeddedChunk],
        pool: &PgPool,
    ) -> Result<usize> {
        for embedded in chunks {
            check_dimensions(&embedded.embedding)?;
        }

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM document_chunks WHERE source_document = $1")
            .bind(source_document)
            .execute(&mut *tx)
            .await?;

        for embedded in chunks {
            let chunk = &embedded.chunk;
            sqlx::query(
                r#"
                INSERT INTO document_chunks
                    (id, source_document, chunk_index, char_start, char_end, overlap_chars, content, embedding)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(ChunkId::new())
            .bind(source_document)
            .bind(to_i32(chunk.index)?)
            .bind(to_i32(chunk.char_start)?)
            .bind(to_i32(chunk.char_end)?)
            .bind(to_i32(chunk.overlap)?)
            .bind(&chunk.text)
            .bind(Vector::from(embedded.embedding.clone()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    pub async fn find_by_document(source_document: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM document_chunks WHERE source_document = $1 ORDER BY chunk_index",
        )
        .bind(source_document)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn delete_for_document(source_document: &str, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE source_document = $1")
            .bind(source_document)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Nearest chunks above `threshold` similarity, best first.
    #[instrument(skip(query_embedding, pool))]
    pub async fn match_chunks(
        query_embedding: &[f32],
        threshold: f64,
        count: i32,
        pool: &PgPool,
    ) -> Result<Vec<ChunkMatch>> {
        check_dimensions(query_embedding)?;

        sqlx::query_as::<_, ChunkMatch>(
            r#"
            SELECT id, source_document, chunk_index, content, similarity, supplier_name
            FROM match_document_chunks($1, $2, $3)
            "#,
        )
        .bind(Vector::from(query_embedding.to_vec()))
        .bind(threshold)
        .bind(count)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

fn check_dimensions(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBEDDING_DIMENSIONS {
        return Err(PipelineError::DimensionMismatch {
            expected: EMBEDDING_DIMENSIONS,
            actual: embedding.len(),
        });
    }
    Ok(())
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| PipelineError::SchemaValidation(format!("offset {} exceeds i32", value)))
}
