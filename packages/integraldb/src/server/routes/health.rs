use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::server::app::AppState;

const DB_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, `empty` (reachable but nothing to answer from) or `unavailable`
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<IndexCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    pool: PoolStats,
}

/// Rows the query stage can draw on.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct IndexCounts {
    suppliers: i64,
    products: i64,
    document_chunks: i64,
}

#[derive(Debug, Serialize)]
pub struct PoolStats {
    size: u32,
    idle: usize,
    max: u32,
}

impl IndexCounts {
    async fn load(pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM suppliers) AS suppliers,
                (SELECT COUNT(*) FROM products) AS products,
                (SELECT COUNT(*) FROM document_chunks) AS document_chunks
            "#,
        )
        .fetch_one(pool)
        .await
    }

    fn is_empty(&self) -> bool {
        self.products == 0 && self.document_chunks == 0
    }
}

/// Database reachability plus what the catalog and chunk index hold.
///
/// 503 when the database does not answer within five seconds. An empty index
/// is still 200: the server works, it just has nothing to say yet.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let pool = &state.db_pool;
    let stats = PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
        max: pool.options().get_max_connections(),
    };

    let (code, response) = match tokio::time::timeout(DB_TIMEOUT, IndexCounts::load(pool)).await {
        Ok(Ok(counts)) => (
            StatusCode::OK,
            HealthResponse {
                status: if counts.is_empty() { "empty" } else { "ok" },
                index: Some(counts),
                error: None,
                pool: stats,
            },
        ),
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "unavailable",
                index: None,
                error: Some(format!("query failed: {}", e)),
                pool: stats,
            },
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "unavailable",
                index: None,
                error: Some(format!("no answer within {}s", DB_TIMEOUT.as_secs())),
                pool: stats,
            },
        ),
    };

    (code, Json(response))
}
