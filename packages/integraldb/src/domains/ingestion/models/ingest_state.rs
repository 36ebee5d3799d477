//! What ingestion has already downloaded, so reruns only fetch what's new.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::{PipelineError, Result};
use crate::kernel::DriveFile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestState {
    /// `message_id:attachment_id` keys of saved mail attachments
    #[serde(default)]
    pub gmail_attachments: BTreeSet<String>,
    /// Drive file id → last downloaded version
    #[serde(default)]
    pub drive_files: BTreeMap<String, DriveFileState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveFileState {
    pub name: String,
    pub modified_time: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStatus {
    New,
    Changed,
    Unchanged,
}

impl IngestState {
    /// Load state; a missing or unreadable file starts from scratch.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ingest state unreadable, starting fresh");
                Ok(Self::default())
            }
        }
    }

    /// Write state via a temp file and rename, so a crash never leaves it half-written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| PipelineError::SchemaValidation(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn has_attachment(&self, message_id: &str, attachment_id: &str) -> bool {
        self.gmail_attachments
            .contains(&attachment_key(message_id, attachment_id))
    }

    pub fn record_attachment(&mut self, message_id: &str, attachment_id: &str) {
        self.gmail_attachments
            .insert(attachment_key(message_id, attachment_id));
    }

    pub fn drive_status(&self, file: &DriveFile) -> DriveStatus {
        match self.drive_files.get(&file.id) {
            None => DriveStatus::New,
            Some(seen) if seen.modified_time != file.modified_time => DriveStatus::Changed,
            Some(_) => DriveStatus::Unchanged,
        }
    }

    pub fn record_drive_file(&mut self, file: &DriveFile, path: PathBuf) {
        self.drive_files.insert(
            file.id.clone(),
            DriveFileState {
                name: file.name.clone(),
                modified_time: file.modified_time.clone(),
                path,
            },
        );
    }
}

fn attachment_key(message_id: &str, attachment_id: &str) -> String {
    format!("{}:{}", message_id, attachment_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_file(modified: &str) -> DriveFile {
        DriveFile {
            id: "f1".into(),
            name: "Catalog".into(),
            mime_type: "application/vnd.google-apps.document".into(),
            modified_time: modified.into(),
        }
    }

    #[test]
    fn test_drive_status_tracks_modified_time() {
        let mut state = IngestState::default();
        let v1 = drive_file("2026-01-01T00:00:00Z");
        assert_eq!(state.drive_status(&v1), DriveStatus::New);

        state.record_drive_file(&v1, PathBuf::from("data/attachments/Catalog.pdf"));
        assert_eq!(state.drive_status(&v1), DriveStatus::Unchanged);

        let v2 = drive_file("2026-02-01T00:00:00Z");
        assert_eq!(state.drive_status(&v2), DriveStatus::Changed);
    }

    #[test]
    fn test_attachment_keys() {
        let mut state = IngestState::default();
        assert!(!state.has_attachment("m1", "a1"));
        state.record_attachment("m1", "a1");
        assert!(state.has_attachment("m1", "a1"));
        assert!(!state.has_attachment("m1", "a2"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("integraldb-state-{}", uuid::Uuid::new_v4()));
        let path = dir.join("ingest_state.json");

        let mut state = IngestState::default();
        state.record_attachment("m1", "a1");
        state.record_drive_file(&drive_file("t1"), PathBuf::from("x.pdf"));
        state.save(&path).await.unwrap();

        assert_eq!(IngestState::load(&path).await.unwrap(), state);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_state_starts_fresh() {
        let path = std::env::temp_dir().join(format!("integraldb-state-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"{ nope").await.unwrap();

        assert_eq!(IngestState::load(&path).await.unwrap(), IngestState::default());
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
