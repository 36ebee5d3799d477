//! PDF text extraction and content fingerprints.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::common::{PipelineError, Result};

/// A PDF read from disk, fingerprinted but not yet parsed.
#[derive(Debug, Clone)]
pub struct PdfFile {
    /// File name, used as the source document id
    pub name: String,
    pub content_hash: String,
    bytes: Vec<u8>,
}

impl PdfFile {
    pub async fn open(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(source_name(path), bytes))
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_hash: content_hash(&bytes),
            bytes,
        }
    }

    /// Pull out the text, stripped of NUL characters.
    ///
    /// Parsing runs on the blocking pool; the parser can panic on malformed
    /// files, which surfaces here as [`PipelineError::Pdf`].
    pub async fn extract_text(self) -> Result<String> {
        let name = self.name;
        let bytes = self.bytes;

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| PipelineError::Pdf(format!("{}: extractor panicked: {}", name, e)))?
            .map_err(|e| PipelineError::Pdf(format!("{}: {}", name, e)))?;

        let text = sanitize_text(&text);
        debug!(document = %name, chars = text.chars().count(), "Extracted PDF text");
        Ok(text)
    }
}

/// File name component of `path`, the id documents are stored under.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Postgres text columns reject NUL; PDFs occasionally contain them.
pub fn sanitize_text(text: &str) -> String {
    text.replace('\0', "").trim().to_string()
}

/// PDFs directly under `dir`, sorted by name.
pub async fn list_pdfs(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}
