use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

use crate::common::{PipelineError, Result, SkipId};
use crate::domains::pipeline::Stage;

/// A record a stage gave up on, kept so every skip can be traced later.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SkippedRecord {
    pub id: SkipId,
    pub stage: String,
    pub record_id: String,
    pub error_kind: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl SkippedRecord {
    /// Log the skip and persist it.
    pub async fn record(
        stage: Stage,
        record_id: &str,
        error: &PipelineError,
        pool: &PgPool,
    ) -> Result<Self> {
        warn!(
            stage = stage.as_str(),
            record_id,
            error_kind = error.kind(),
            error = %error,
            "Skipping record"
        );

        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO pipeline_skips (id, stage, record_id, error_kind, reason)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(SkipId::new())
        .bind(stage.as_str())
        .bind(record_id)
        .bind(error.kind())
        .bind(error.to_string())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Most recent skips for a stage.
    pub async fn recent(stage: Stage, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM pipeline_skips
            WHERE stage = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(stage.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
