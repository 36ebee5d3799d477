//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::domains::query::QueryEngine;
use crate::kernel::PipelineDeps;
use crate::server::routes::{ask_handler, health_handler, index_handler};

/// Generation can be slow; anything past this is abandoned.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub engine: Arc<QueryEngine>,
}

impl AppState {
    pub fn new(db_pool: PgPool, engine: Arc<QueryEngine>) -> Self {
        Self { db_pool, engine }
    }

    /// State for production: the query engine wired to Postgres and OpenAI.
    pub fn from_deps(deps: &PipelineDeps) -> Self {
        Self::new(deps.db_pool.clone(), Arc::new(QueryEngine::from_deps(deps)))
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // The page is served from the same origin; CORS only matters for local tooling.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/ask", post(ask_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
