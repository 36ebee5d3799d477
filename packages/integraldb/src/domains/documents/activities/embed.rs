//! Embedding stage: PDF → text → overlapping chunks → vectors → `document_chunks`.
//!
//! Documents are handled one at a time. A document's chunks are written in a
//! single transaction, so a failure part-way leaves its previous chunks intact.

use std::path::Path;

use tracing::{info, instrument};

use crate::common::{PipelineError, Result};
use crate::domains::documents::chunking::chunk_text;
use crate::domains::documents::models::{DocumentChunk, EmbeddedChunk};
use crate::domains::documents::pdf::{list_pdfs, source_name, PdfFile};
use crate::domains::pipeline::{ProcessedDocument, SkippedRecord, Stage};
use crate::kernel::PipelineDeps;

/// Chunks sent to the embedding service per request.
const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    Embedded { chunks: usize },
    /// Content hash matches the last successful run
    Unchanged,
    /// No extractable text; any previous chunks were removed
    Empty,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmbedReport {
    pub documents: usize,
    pub embedded: usize,
    pub unchanged: usize,
    pub empty: usize,
    pub skipped: usize,
    pub chunks_written: usize,
}

/// Embed every PDF in the attachments directory.
///
/// With `reindex`, content hashes are ignored and every document is re-embedded.
#[instrument(skip(deps))]
pub async fn embed_documents(deps: &PipelineDeps, reindex: bool) -> Result<EmbedReport> {
    let dir = deps.config.attachments_dir();
    let paths = list_pdfs(&dir).await?;
    let mut report = EmbedReport {
        documents: paths.len(),
        ..Default::default()
    };

    for path in paths {
        let name = source_name(&path);
        match embed_document(deps, &path, reindex).await {
            Ok(EmbedOutcome::Embedded { chunks }) => {
                report.embedded += 1;
                report.chunks_written += chunks;
            }
            Ok(EmbedOutcome::Unchanged) => report.unchanged += 1,
            Ok(EmbedOutcome::Empty) => report.empty += 1,
            Err(e) if e.is_skippable() => {
                SkippedRecord::record(Stage::Embed, &name, &e, &deps.db_pool).await?;
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        documents = report.documents,
        embedded = report.embedded,
        unchanged = report.unchanged,
        skipped = report.skipped,
        chunks = report.chunks_written,
        "Embedding stage finished"
    );
    Ok(report)
}

/// Embed one PDF unless its current content was already embedded.
#[instrument(skip(deps), fields(document = %path.display()))]
pub async fn embed_document(
    deps: &PipelineDeps,
    path: &Path,
    reindex: bool,
) -> Result<EmbedOutcome> {
    let pdf = PdfFile::open(path).await?;
    let name = pdf.name.clone();
    let hash = pdf.content_hash.clone();

    if !reindex
        && ProcessedDocument::is_current(Stage::Embed, &name, &hash, &deps.db_pool).await?
    {
        return Ok(EmbedOutcome::Unchanged);
    }

    let text = pdf.extract_text().await?;
    let outcome = embed_text(deps, &name, &text).await?;
    ProcessedDocument::mark(Stage::Embed, &name, &hash, &deps.db_pool).await?;
    Ok(outcome)
}

/// Chunk, embed and store `text` under `source_document`, replacing any
/// chunks stored for it before.
pub async fn embed_text(
    deps: &PipelineDeps,
    source_document: &str,
    text: &str,
) -> Result<EmbedOutcome> {
    let chunks = chunk_text(text, &deps.config.chunking);
    if chunks.is_empty() {
        DocumentChunk::delete_for_document(source_document, &deps.db_pool).await?;
        info!(document = source_document, "No text to embed");
        return Ok(EmbedOutcome::Empty);
    }

    // Every vector is fetched before the write transaction opens.
    let mut embedded = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = deps.embeddings.generate_batch(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(PipelineError::SchemaValidation(format!(
                "{} embeddings returned for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }
        embedded.extend(
            batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding }),
        );
    }

    let written =
        DocumentChunk::replace_for_document(source_document, &embedded, &deps.db_pool).await?;
    info!(document = source_document, chunks = written, "Embedded document");
    Ok(EmbedOutcome::Embedded { chunks: written })
}
