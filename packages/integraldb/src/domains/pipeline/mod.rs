//! Stage bookkeeping and the end-to-end run.

pub mod activities;
pub mod models;

pub use activities::{clear_tables, resolve_tables, run_once, ClearedTable, RunReport};
pub use models::{ProcessedDocument, SkippedRecord};

use std::fmt;

/// Pipeline stages, in the order data flows through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Extract,
    Embed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Extract => "extract",
            Stage::Embed => "embed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
