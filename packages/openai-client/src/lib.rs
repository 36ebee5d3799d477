//! Minimal client for OpenAI-compatible chat, structured output and
//! embeddings endpoints.
//!
//! Every request goes through a [`RetryPolicy`]: network failures, 429s and
//! 5xx responses are retried with exponential backoff, anything else is
//! returned immediately.
//!
//! ```rust,ignore
//! use openai_client::{ChatRequest, Message, OpenAIClient};
//!
//! let client = OpenAIClient::from_env()?;
//! let reply = client
//!     .chat_completion(ChatRequest::new("gpt-4o-mini").message(Message::user("Hello")))
//!     .await?;
//!
//! let vector = client
//!     .create_embedding("text to embed", "text-embedding-3-small", Some(1536))
//!     .await?;
//! ```

pub mod error;
pub mod retry;
pub mod schema;
pub mod types;

pub use error::{OpenAIError, Result};
pub use retry::{RetryPolicy, Retryable};
pub use schema::StructuredOutput;
pub use types::*;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OpenAIError::Config("OPENAI_API_KEY not set".into()))?;
        if api_key.trim().is_empty() {
            return Err(OpenAIError::Config("OPENAI_API_KEY is empty".into()));
        }
        Ok(Self::new(api_key))
    }

    /// Point at a proxy or compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Ask for a value of type `T`, validated against its generated schema.
    pub async fn extract<T: StructuredOutput>(
        &self,
        model: &str,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let request = StructuredRequest::new(
            model,
            T::format_name(),
            system_prompt,
            user_prompt,
            T::openai_schema(),
        );
        let json_str = self.structured_output(request).await?;

        serde_json::from_str(strip_code_blocks(&json_str)).map_err(|e| {
            OpenAIError::Parse(format!("Failed to deserialize {}: {}", T::format_name(), e))
        })
    }

    /// Chat completion.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();
        let raw: types::ChatResponseRaw = self.post("chat/completions", &request).await?;
        let (content, usage) = raw
            .into_first_content()
            .ok_or_else(|| OpenAIError::Parse("No content in chat completion".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "OpenAI chat completion"
        );

        Ok(ChatResponse { content, usage })
    }

    /// Chat completion with `response_format = json_schema`; returns the raw JSON text.
    pub async fn structured_output(&self, request: StructuredRequest) -> Result<String> {
        let raw: types::ChatResponseRaw = self.post("chat/completions", &request).await?;
        raw.into_first_content()
            .map(|(content, _)| content)
            .ok_or_else(|| OpenAIError::Parse("No content in structured output".into()))
    }

    /// Embed a single text.
    ///
    /// When `dimensions` is set it is both requested from the API and
    /// checked on the returned vector.
    pub async fn create_embedding(
        &self,
        text: &str,
        model: &str,
        dimensions: Option<usize>,
    ) -> Result<Vec<f32>> {
        self.create_embeddings(&[text], model, dimensions)
            .await?
            .pop()
            .ok_or_else(|| OpenAIError::Parse("No embedding returned".into()))
    }

    /// Embed several texts in one request, preserving input order.
    pub async fn create_embeddings(
        &self,
        texts: &[&str],
        model: &str,
        dimensions: Option<usize>,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = types::EmbeddingRequest {
            model,
            input: texts,
            dimensions,
        };
        let mut response: types::EmbeddingResponse = self.post("embeddings", &request).await?;
        response.data.sort_by_key(|d| d.index);

        if response.data.len() != texts.len() {
            return Err(OpenAIError::Parse(format!(
                "Got {} embeddings for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }

        response
            .data
            .into_iter()
            .map(|d| match dimensions {
                Some(expected) if d.embedding.len() != expected => {
                    Err(OpenAIError::DimensionMismatch {
                        expected,
                        actual: d.embedding.len(),
                    })
                }
                _ => Ok(d.embedding),
            })
            .collect()
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let url = url.as_str();
        self.retry
            .run(path, || async move {
                let response = self
                    .http_client
                    .post(url)
                    .bearer_auth(&self.api_key)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| OpenAIError::Network(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let error_text = response.text().await.unwrap_or_default();
                    warn!(path, status = %status, error = %error_text, "OpenAI API error");
                    return Err(retry::api_error(status, error_text));
                }

                response
                    .json::<R>()
                    .await
                    .map_err(|e| OpenAIError::Parse(e.to_string()))
            })
            .await
    }
}
