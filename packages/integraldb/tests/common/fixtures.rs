//! Builders for configs, dependencies and catalog rows used across tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use integraldb_core::common::ChunkId;
use integraldb_core::domains::catalog::models::{ProductFact, Supplier};
use integraldb_core::domains::documents::models::ChunkMatch;
use integraldb_core::kernel::{MockAI, MockEmbeddingService, PipelineDeps};
use integraldb_core::Config;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Config with test credentials, small chunks, and `data_dir` as DATA_DIR.
pub fn test_config(data_dir: &Path) -> Config {
    let vars: HashMap<&str, String> = [
        ("DATABASE_URL", "postgres://unused/test".to_string()),
        ("OPENAI_API_KEY", "sk-test".to_string()),
        ("CHUNK_SIZE", "40".to_string()),
        ("CHUNK_OVERLAP", "10".to_string()),
        ("DATA_DIR", data_dir.display().to_string()),
    ]
    .into_iter()
    .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

/// Fresh directory under the system temp dir.
pub fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("integraldb-test-{}", Uuid::new_v4()))
}

pub fn test_deps(
    pool: PgPool,
    data_dir: &Path,
    ai: Arc<MockAI>,
    embeddings: Arc<MockEmbeddingService>,
) -> PipelineDeps {
    PipelineDeps::new(pool, ai, embeddings, Arc::new(test_config(data_dir)))
}

/// Supplier with a name unique to this test run.
pub async fn create_supplier(pool: &PgPool, name: &str) -> Supplier {
    let unique = format!("{} {}", name, Uuid::new_v4().simple());
    Supplier::upsert(&unique, Some("sales@example.test"), None, pool)
        .await
        .expect("create supplier")
}

pub fn fact(supplier: &str, product: &str, sku: &str, price_cents: i64) -> ProductFact {
    ProductFact {
        product_name: product.to_string(),
        price: Some(Decimal::new(price_cents, 2)),
        sku: Some(sku.to_string()),
        specifications: None,
        source_document: "body_m1".to_string(),
        supplier_name: supplier.to_string(),
        contact_email: None,
        contact_phone: None,
    }
}

pub fn chunk_match(source_document: &str, chunk_index: i32, similarity: f64, content: &str) -> ChunkMatch {
    ChunkMatch {
        id: ChunkId::new(),
        source_document: source_document.to_string(),
        chunk_index,
        content: content.to_string(),
        similarity,
        supplier_name: None,
    }
}
