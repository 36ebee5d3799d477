pub mod ingest;

pub use ingest::{collect_drive, collect_mail, ingest, IngestReport};
