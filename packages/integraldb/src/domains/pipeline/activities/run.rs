//! One end-to-end pass: ingest → extract → embed.

use tracing::{error, info, instrument};

use crate::common::Result;
use crate::domains::catalog::activities::{extract_staged_records, ExtractReport};
use crate::domains::documents::activities::{embed_documents, EmbedReport};
use crate::domains::ingestion::activities::{ingest, IngestReport};
use crate::domains::pipeline::{SkippedRecord, Stage};
use crate::kernel::{BaseDrive, BaseMailbox, PipelineDeps};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// `None` when no mailbox was configured or the inbox was unreachable
    pub ingest: Option<IngestReport>,
    pub extract: ExtractReport,
    pub embed: EmbedReport,
}

/// Run every stage once, in order.
///
/// An unreachable inbox is recorded as an ingest skip and the later stages
/// still run over what is already staged. Fatal errors stop the run.
#[instrument(skip(deps, mailbox, drive))]
pub async fn run_once(
    deps: &PipelineDeps,
    mailbox: Option<&dyn BaseMailbox>,
    drive: Option<&dyn BaseDrive>,
) -> Result<RunReport> {
    let ingest = match mailbox {
        Some(mailbox) => match ingest(deps, mailbox, drive, deps.config.max_emails).await {
            Ok(report) => Some(report),
            Err(e) if e.is_skippable() => {
                error!(error = %e, "Ingestion failed, continuing with staged data");
                SkippedRecord::record(Stage::Ingest, "inbox", &e, &deps.db_pool).await?;
                None
            }
            Err(e) => return Err(e),
        },
        None => {
            info!("No mailbox configured, skipping ingestion");
            None
        }
    };

    let extract = extract_staged_records(deps).await?;
    let embed = embed_documents(deps, false).await?;

    info!(
        extracted = extract.extracted,
        products = extract.products_written,
        embedded = embed.embedded,
        chunks = embed.chunks_written,
        "Pipeline run finished"
    );
    Ok(RunReport {
        ingest,
        extract,
        embed,
    })
}
