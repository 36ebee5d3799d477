//! Staged email records, one JSON object per line.
//!
//! Ingestion appends; extraction reads the whole file. A line that fails to
//! parse is reported back to the caller, not dropped silently.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::common::{PipelineError, Result};

/// One ingested message and the PDFs saved from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub received_at: Option<DateTime<Utc>>,
    pub body: String,
    #[serde(default)]
    pub attachment_paths: Vec<PathBuf>,
}

/// A staging line that could not be parsed.
#[derive(Debug)]
pub struct MalformedLine {
    pub line: usize,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct StagedRecords {
    pub records: Vec<EmailRecord>,
    pub malformed: Vec<MalformedLine>,
}

impl EmailRecord {
    /// Document id of the body text.
    pub fn body_document(&self) -> String {
        format!("body_{}", self.id)
    }

    /// Append records to the staging file, creating it (and its directory) if needed.
    pub async fn append_staged(path: &Path, records: &[EmailRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)
                .map_err(|e| PipelineError::SchemaValidation(e.to_string()))?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every staged record. When a message id appears more than once,
    /// the last line wins. A missing file is an empty stage.
    pub async fn read_staged(path: &Path) -> Result<StagedRecords> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StagedRecords::default())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_staged(&content))
    }
}

fn parse_staged(content: &str) -> StagedRecords {
    let mut staged = StagedRecords::default();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EmailRecord>(line) {
            Ok(record) => {
                staged.records.retain(|r| r.id != record.id);
                staged.records.push(record);
            }
            Err(e) => staged.malformed.push(MalformedLine {
                line: idx + 1,
                error: PipelineError::SchemaValidation(e.to_string()),
            }),
        }
    }

    staged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, subject: &str) -> EmailRecord {
        EmailRecord {
            id: id.to_string(),
            sender: "sales@acme.test".to_string(),
            subject: subject.to_string(),
            received_at: None,
            body: "See attached price list".to_string(),
            attachment_paths: vec![PathBuf::from(format!("data/attachments/{}_prices.pdf", id))],
        }
    }

    #[test]
    fn test_malformed_lines_are_reported() {
        let good = serde_json::to_string(&record("m1", "Prices")).unwrap();
        let content = format!("{}\n{{not json\n\n", good);

        let staged = parse_staged(&content);
        assert_eq!(staged.records.len(), 1);
        assert_eq!(staged.malformed.len(), 1);
        assert_eq!(staged.malformed[0].line, 2);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let first = serde_json::to_string(&record("m1", "v1")).unwrap();
        let second = serde_json::to_string(&record("m1", "v2")).unwrap();
        let staged = parse_staged(&format!("{}\n{}\n", first, second));

        assert_eq!(staged.records.len(), 1);
        assert_eq!(staged.records[0].subject, "v2");
    }

    #[test]
    fn test_body_document_name() {
        assert_eq!(record("18c2", "x").body_document(), "body_18c2");
    }

    #[tokio::test]
    async fn test_append_then_read() {
        let path = std::env::temp_dir()
            .join(format!("integraldb-stage-{}", uuid::Uuid::new_v4()))
            .join("emails.jsonl");

        EmailRecord::append_staged(&path, &[record("a", "one")]).await.unwrap();
        EmailRecord::append_staged(&path, &[record("b", "two")]).await.unwrap();

        let staged = EmailRecord::read_staged(&path).await.unwrap();
        let ids: Vec<&str> = staged.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(staged.malformed.is_empty());

        tokio::fs::remove_dir_all(path.parent().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let path = std::env::temp_dir().join(format!("integraldb-none-{}.jsonl", uuid::Uuid::new_v4()));
        let staged = EmailRecord::read_staged(&path).await.unwrap();
        assert!(staged.records.is_empty());
    }
}
