// Typed structured output over `BaseAI`.

use openai_client::{strip_code_blocks, StructuredOutput};
use tracing::debug;

use super::BaseAI;
use crate::common::{PipelineError, Result};

/// Ask the model for a `T`, with the schema generated from `T`.
///
/// A response that doesn't deserialize into `T` is a schema-validation error.
pub async fn extract_structured<T: StructuredOutput>(
    ai: &dyn BaseAI,
    system: &str,
    user: &str,
) -> Result<T> {
    let name = T::format_name();
    let raw = ai
        .generate_structured(system, user, &name, T::openai_schema())
        .await?;

    debug!(schema = %name, bytes = raw.len(), "Structured response received");

    serde_json::from_str(strip_code_blocks(&raw))
        .map_err(|e| PipelineError::SchemaValidation(format!("{}: {}", name, e)))
}
