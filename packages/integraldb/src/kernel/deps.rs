//! Dependencies handed to every pipeline stage.
//!
//! Built once at process start and passed down explicitly; nothing in the
//! crate reaches for global state.

use sqlx::PgPool;
use std::sync::Arc;

use super::{BaseAI, BaseEmbeddingService, OpenAIService};
use crate::config::Config;

#[derive(Clone)]
pub struct PipelineDeps {
    pub db_pool: PgPool,
    pub ai: Arc<dyn BaseAI>,
    pub embeddings: Arc<dyn BaseEmbeddingService>,
    pub config: Arc<Config>,
}

impl PipelineDeps {
    pub fn new(
        db_pool: PgPool,
        ai: Arc<dyn BaseAI>,
        embeddings: Arc<dyn BaseEmbeddingService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db_pool,
            ai,
            embeddings,
            config,
        }
    }

    /// Production wiring: one OpenAI service backs both generation and embeddings.
    pub fn from_config(config: Config, db_pool: PgPool) -> Self {
        let openai = Arc::new(OpenAIService::from_config(&config));
        Self::new(db_pool, openai.clone(), openai, Arc::new(config))
    }
}
