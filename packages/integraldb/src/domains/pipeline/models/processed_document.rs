use sqlx::{PgExecutor, PgPool};

use crate::common::Result;
use crate::domains::pipeline::Stage;

/// Per-stage marker that a document's current content has been handled.
///
/// Keyed on content hash, so a document whose bytes change is picked up again.
pub struct ProcessedDocument;

impl ProcessedDocument {
    pub async fn is_current(
        stage: Stage,
        source_document: &str,
        content_hash: &str,
        pool: &PgPool,
    ) -> Result<bool> {
        let found: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT content_hash FROM processed_documents
            WHERE stage = $1 AND source_document = $2
            "#,
        )
        .bind(stage.as_str())
        .bind(source_document)
        .fetch_optional(pool)
        .await?;

        Ok(matches!(found, Some((hash,)) if hash == content_hash))
    }

    pub async fn mark(
        stage: Stage,
        source_document: &str,
        content_hash: &str,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_documents (stage, source_document, content_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (stage, source_document)
            DO UPDATE SET content_hash = EXCLUDED.content_hash, processed_at = NOW()
            "#,
        )
        .bind(stage.as_str())
        .bind(source_document)
        .bind(content_hash)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Forget every marker for a stage so the next run reprocesses everything.
    pub async fn reset<'e>(stage: Stage, executor: impl PgExecutor<'e>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM processed_documents WHERE stage = $1")
            .bind(stage.as_str())
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
