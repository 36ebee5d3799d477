// OpenAI-backed implementations of BaseAI and BaseEmbeddingService.

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient, StructuredRequest};

use super::{BaseAI, BaseEmbeddingService};
use crate::common::Result;
use crate::config::{Config, EMBEDDING_DIMENSIONS};

pub struct OpenAIService {
    client: OpenAIClient,
    chat_model: String,
    embedding_model: String,
}

impl OpenAIService {
    pub fn new(
        client: OpenAIClient,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut client = OpenAIClient::new(&config.openai_api_key)
            .with_retry_policy(config.retry_policy());
        if let Some(base_url) = &config.openai_base_url {
            client = client.with_base_url(base_url);
        }
        Self::new(client, &config.chat_model, &config.embedding_model)
    }
}

#[async_trait]
impl BaseAI for OpenAIService {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest::new(&self.chat_model)
            .message(Message::system(system))
            .message(Message::user(user))
            .temperature(0.0);

        Ok(self.client.chat_completion(request).await?.content)
    }

    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        let request = StructuredRequest::new(&self.chat_model, schema_name, system, user, schema);
        Ok(self.client.structured_output(request).await?)
    }
}

#[async_trait]
impl BaseEmbeddingService for OpenAIService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .client
            .create_embedding(text, &self.embedding_model, Some(EMBEDDING_DIMENSIONS))
            .await?)
    }

    async fn generate_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(self
            .client
            .create_embeddings(texts, &self.embedding_model, Some(EMBEDDING_DIMENSIONS))
            .await?)
    }
}
