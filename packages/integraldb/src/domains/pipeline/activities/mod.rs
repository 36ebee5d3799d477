pub mod clear;
pub mod run;

pub use clear::{clear_tables, resolve_tables, ClearedTable, CLEARABLE_TABLES};
pub use run::{run_once, RunReport};
