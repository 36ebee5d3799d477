// Types shared across domains

pub mod entity_ids;
pub mod error;
pub mod id;

pub use entity_ids::*;
pub use error::{PipelineError, Result};
pub use id::Id;
