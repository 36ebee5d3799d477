// Mock implementations of the kernel traits for tests.
//
// Responses are queued with `with_*` builders and popped in order; every
// call is recorded so tests can assert on what a stage asked for.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use super::{BaseAI, BaseDrive, BaseEmbeddingService, BaseMailbox, DriveFile, MailMessage};
use crate::common::{PipelineError, Result};
use crate::config::EMBEDDING_DIMENSIONS;

// =============================================================================
// Mock AI
// =============================================================================

#[derive(Debug, Clone)]
pub struct CompleteCall {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone)]
pub struct StructuredCall {
    pub system: String,
    pub user: String,
    pub schema_name: String,
}

#[derive(Default)]
pub struct MockAI {
    completions: Arc<Mutex<VecDeque<Result<String>>>>,
    structured: Arc<Mutex<VecDeque<Result<String>>>>,
    complete_calls: Arc<Mutex<Vec<CompleteCall>>>,
    structured_calls: Arc<Mutex<Vec<StructuredCall>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(self, text: &str) -> Self {
        self.completions
            .lock()
            .unwrap()
            .push_back(Ok(text.to_string()));
        self
    }

    pub fn with_structured_response(self, json: &str) -> Self {
        self.structured
            .lock()
            .unwrap()
            .push_back(Ok(json.to_string()));
        self
    }

    pub fn with_structured_error(self, error: PipelineError) -> Self {
        self.structured.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn complete_calls(&self) -> Vec<CompleteCall> {
        self.complete_calls.lock().unwrap().clone()
    }

    pub fn structured_calls(&self) -> Vec<StructuredCall> {
        self.structured_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.complete_calls.lock().unwrap().push(CompleteCall {
            system: system.to_string(),
            user: user.to_string(),
        });
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("mock answer".to_string()))
    }

    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        _schema: serde_json::Value,
    ) -> Result<String> {
        self.structured_calls.lock().unwrap().push(StructuredCall {
            system: system.to_string(),
            user: user.to_string(),
            schema_name: schema_name.to_string(),
        });
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::Remote("no mock structured response".into())))
    }
}

// =============================================================================
// Mock Embedding Service
// =============================================================================

/// Deterministic embeddings: the same text always maps to the same vector.
#[derive(Default)]
pub struct MockEmbeddingService {
    failures: Arc<Mutex<HashMap<String, VecDeque<PipelineError>>>>,
    dimensions: Option<usize>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockEmbeddingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call whose text contains `needle`.
    pub fn with_failure(self, needle: &str, error: PipelineError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(needle.to_string())
            .or_default()
            .push_back(error);
        self
    }

    /// Return vectors of the wrong width.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn vector_for(text: &str, dimensions: usize) -> Vec<f32> {
        let seed = text
            .bytes()
            .fold(7u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        (0..dimensions)
            .map(|i| ((seed.wrapping_add(i as u32 * 17) % 101) as f32) / 101.0)
            .collect()
    }
}

#[async_trait]
impl BaseEmbeddingService for MockEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());

        let failure = {
            let mut failures = self.failures.lock().unwrap();
            failures
                .iter_mut()
                .find(|(needle, queue)| text.contains(needle.as_str()) && !queue.is_empty())
                .and_then(|(_, queue)| queue.pop_front())
        };
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(Self::vector_for(
            text,
            self.dimensions.unwrap_or(EMBEDDING_DIMENSIONS),
        ))
    }
}

// =============================================================================
// Mock Mailbox / Drive
// =============================================================================

#[derive(Default)]
pub struct MockMailbox {
    messages: Vec<MailMessage>,
    attachments: HashMap<(String, String), Vec<u8>>,
    attachment_calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: MailMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_attachment(mut self, message_id: &str, attachment_id: &str, bytes: &[u8]) -> Self {
        self.attachments.insert(
            (message_id.to_string(), attachment_id.to_string()),
            bytes.to_vec(),
        );
        self
    }

    pub fn attachment_calls(&self) -> Vec<(String, String)> {
        self.attachment_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseMailbox for MockMailbox {
    async fn list_message_ids(&self, max: u32) -> Result<Vec<String>> {
        Ok(self
            .messages
            .iter()
            .take(max as usize)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<MailMessage> {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| PipelineError::Remote(format!("no such message {}", id)))
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let key = (message_id.to_string(), attachment_id.to_string());
        self.attachment_calls.lock().unwrap().push(key.clone());
        self.attachments
            .get(&key)
            .cloned()
            .ok_or_else(|| PipelineError::Transient(format!("attachment {} unavailable", attachment_id)))
    }
}

#[derive(Default)]
pub struct MockDrive {
    files: Vec<(DriveFile, Vec<u8>)>,
    downloads: Arc<Mutex<HashSet<String>>>,
}

impl MockDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: DriveFile, bytes: &[u8]) -> Self {
        self.files.push((file, bytes.to_vec()));
        self
    }

    pub fn downloaded(&self) -> HashSet<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseDrive for MockDrive {
    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        Ok(self.files.iter().map(|(f, _)| f.clone()).collect())
    }

    async fn download_pdf(&self, file: &DriveFile) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().insert(file.id.clone());
        self.files
            .iter()
            .find(|(f, _)| f.id == file.id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| PipelineError::Remote(format!("no such file {}", file.id)))
    }
}
