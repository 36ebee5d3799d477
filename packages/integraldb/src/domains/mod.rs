pub mod catalog;
pub mod documents;
pub mod ingestion;
pub mod pipeline;
pub mod query;
