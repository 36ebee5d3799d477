pub mod email_record;
pub mod ingest_state;

pub use email_record::{EmailRecord, MalformedLine, StagedRecords};
pub use ingest_state::{DriveFileState, DriveStatus, IngestState};
