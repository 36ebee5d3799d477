//! Mail and drive ingestion into the local staging area.

pub mod activities;
pub mod google;
pub mod models;

pub use activities::{ingest, IngestReport};
pub use models::{EmailRecord, IngestState};
