pub mod processed_document;
pub mod skipped_record;

pub use processed_document::ProcessedDocument;
pub use skipped_record::SkippedRecord;
