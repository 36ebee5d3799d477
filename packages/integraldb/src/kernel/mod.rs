//! Kernel module - infrastructure traits, their implementations, and the
//! dependency container handed to pipeline stages.

pub mod deps;
pub mod llm_request;
pub mod openai;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use deps::PipelineDeps;
pub use llm_request::extract_structured;
pub use openai::OpenAIService;
pub use scheduled_tasks::{start_scheduler, PipelineSources};
pub use test_dependencies::{MockAI, MockDrive, MockEmbeddingService, MockMailbox};
pub use traits::*;
