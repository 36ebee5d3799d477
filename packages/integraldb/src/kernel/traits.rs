// Infrastructure traits for the pipeline's remote collaborators.
//
// These are INFRASTRUCTURE traits only - no business logic. Stages are
// domain functions that take these as `Arc<dyn Base*>` so tests can swap in
// the mocks from `test_dependencies`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::Result;

// =============================================================================
// Language model
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Free-text completion for a system + user prompt pair
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Completion constrained to a JSON schema; returns the raw JSON text.
    /// Parse it with `kernel::extract_structured` or `serde_json::from_str`.
    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String>;
}

// =============================================================================
// Embeddings
// =============================================================================

#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Embed one text (1536 dimensions)
    async fn generate(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn generate_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.generate(text).await?);
        }
        Ok(vectors)
    }
}

// =============================================================================
// Mail and drive
// =============================================================================

/// One message as listed by the mailbox, with attachment handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub received_at: Option<DateTime<Utc>>,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailAttachment {
    pub attachment_id: String,
    pub filename: String,
    pub mime_type: String,
}

impl MailAttachment {
    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf" || self.filename.to_ascii_lowercase().ends_with(".pdf")
    }
}

#[async_trait]
pub trait BaseMailbox: Send + Sync {
    /// Ids of the newest inbox messages, at most `max`
    async fn list_message_ids(&self, max: u32) -> Result<Vec<String>>;

    async fn get_message(&self, id: &str) -> Result<MailMessage>;

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;
}

/// A file in the drive that can be fetched as PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Provider's modification stamp, compared verbatim between runs
    pub modified_time: String,
}

#[async_trait]
pub trait BaseDrive: Send + Sync {
    /// PDFs and native documents exportable as PDF
    async fn list_files(&self) -> Result<Vec<DriveFile>>;

    /// File content as PDF bytes, exporting native documents
    async fn download_pdf(&self, file: &DriveFile) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_attachment_detection() {
        let by_mime = MailAttachment {
            attachment_id: "a".into(),
            filename: "quote".into(),
            mime_type: "application/pdf".into(),
        };
        let by_name = MailAttachment {
            attachment_id: "b".into(),
            filename: "Price-List.PDF".into(),
            mime_type: "application/octet-stream".into(),
        };
        let image = MailAttachment {
            attachment_id: "c".into(),
            filename: "logo.png".into(),
            mime_type: "image/png".into(),
        };

        assert!(by_mime.is_pdf());
        assert!(by_name.is_pdf());
        assert!(!image.is_pdf());
    }
}
