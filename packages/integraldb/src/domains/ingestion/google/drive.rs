//! Drive REST client: lists PDFs and native documents, downloads as PDF.

use std::sync::Arc;

use async_trait::async_trait;
use openai_client::RetryPolicy;
use serde::Deserialize;
use tracing::debug;

use super::{check_status, GoogleAuth};
use crate::common::{PipelineError, Result};
use crate::kernel::{BaseDrive, DriveFile};

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";

pub const PDF_MIME: &str = "application/pdf";
pub const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";

const LIST_QUERY: &str = "(mimeType='application/pdf' or \
     mimeType='application/vnd.google-apps.document') and trashed=false";

pub struct DriveClient {
    http: reqwest::Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
    retry: RetryPolicy,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, auth: Arc<GoogleAuth>) -> Self {
        Self {
            http,
            auth,
            base_url: DRIVE_API.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let url = url.as_str();
        self.retry
            .run(path, || async move {
                let token = self.auth.access_token().await?;
                let response = self
                    .http
                    .get(url)
                    .bearer_auth(token)
                    .query(query)
                    .send()
                    .await?;
                check_status(response).await
            })
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<WireFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    modified_time: String,
}

impl From<WireFile> for DriveFile {
    fn from(f: WireFile) -> Self {
        DriveFile {
            id: f.id,
            name: f.name,
            mime_type: f.mime_type,
            modified_time: f.modified_time,
        }
    }
}

#[async_trait]
impl BaseDrive for DriveClient {
    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("q", LIST_QUERY),
                ("fields", "nextPageToken,files(id,name,mimeType,modifiedTime)"),
                ("pageSize", "100"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: FileList = self
                .get("files", &query)
                .await?
                .json()
                .await
                .map_err(|e| PipelineError::Remote(format!("drive file list: {}", e)))?;
            files.extend(page.files.into_iter().map(DriveFile::from));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = files.len(), "Listed drive files");
        Ok(files)
    }

    async fn download_pdf(&self, file: &DriveFile) -> Result<Vec<u8>> {
        let response = if file.mime_type == GOOGLE_DOC_MIME {
            self.get(&format!("files/{}/export", file.id), &[("mimeType", PDF_MIME)])
                .await?
        } else {
            self.get(&format!("files/{}", file.id), &[("alt", "media")])
                .await?
        };
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Local file name for a drive file: native documents get a `.pdf` suffix.
pub fn local_pdf_name(file: &DriveFile) -> String {
    let name = super::sanitize_filename(&file.name);
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name
    } else {
        format!("{}.pdf", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str) -> DriveFile {
        DriveFile {
            id: "1abc".into(),
            name: name.into(),
            mime_type: mime.into(),
            modified_time: "2026-03-01T10:00:00.000Z".into(),
        }
    }

    #[test]
    fn test_file_list_wire_format() {
        let json = r#"{
            "nextPageToken": "p2",
            "files": [{"id": "1abc", "name": "Catalog 2026", "mimeType": "application/vnd.google-apps.document", "modifiedTime": "2026-03-01T10:00:00.000Z"}]
        }"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(list.next_page_token.as_deref(), Some("p2"));
        let first = DriveFile::from(list.files.into_iter().next().unwrap());
        assert_eq!(first, file("Catalog 2026", GOOGLE_DOC_MIME));
    }

    #[test]
    fn test_local_pdf_name() {
        assert_eq!(local_pdf_name(&file("Catalog 2026", GOOGLE_DOC_MIME)), "Catalog 2026.pdf");
        assert_eq!(local_pdf_name(&file("specs.PDF", PDF_MIME)), "specs.PDF");
        assert_eq!(local_pdf_name(&file("a/b.pdf", PDF_MIME)), "a_b.pdf");
    }
}
