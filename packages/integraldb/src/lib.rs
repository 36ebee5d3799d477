// IntegralDB - supplier email ETL and hybrid retrieval
//
// Pipeline stages live in domains/*/activities and run in order:
// ingestion → catalog extraction → document embedding. The query domain
// answers questions from the catalog tables and the chunk embeddings.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
