// HTTP server setup (Axum): question page, ask API, health
pub mod app;
pub mod routes;

pub use app::*;
