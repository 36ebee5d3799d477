//! Ingestion stage: inbox messages and drive files → PDFs on disk + staged records.
//!
//! Remote reads and file writes happen in [`collect_mail`] and
//! [`collect_drive`]; they return the per-record failures instead of writing
//! them anywhere, and [`ingest`] records those as skips.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::common::{PipelineError, Result};
use crate::domains::ingestion::google::{local_pdf_name, sanitize_filename};
use crate::domains::ingestion::models::{DriveStatus, EmailRecord, IngestState};
use crate::domains::pipeline::{SkippedRecord, Stage};
use crate::kernel::{BaseDrive, BaseMailbox, MailMessage, PipelineDeps};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub messages_listed: usize,
    pub messages_staged: usize,
    pub messages_already_staged: usize,
    pub attachments_downloaded: usize,
    pub drive_downloaded: usize,
    pub drive_unchanged: usize,
    pub skipped: usize,
}

/// Failure for one message, attachment or drive file.
#[derive(Debug)]
pub struct IngestFailure {
    pub record_id: String,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct MailBatch {
    pub records: Vec<EmailRecord>,
    pub listed: usize,
    pub already_staged: usize,
    pub attachments_downloaded: usize,
    pub failures: Vec<IngestFailure>,
}

#[derive(Debug, Default)]
pub struct DriveBatch {
    pub downloaded: Vec<PathBuf>,
    pub unchanged: usize,
    pub failures: Vec<IngestFailure>,
}

/// Run one ingestion pass. Without a drive client only mail is ingested.
#[instrument(skip(deps, mailbox, drive))]
pub async fn ingest(
    deps: &PipelineDeps,
    mailbox: &dyn BaseMailbox,
    drive: Option<&dyn BaseDrive>,
    max_emails: u32,
) -> Result<IngestReport> {
    let config = &deps.config;
    let attachments_dir = config.attachments_dir();
    tokio::fs::create_dir_all(&attachments_dir).await?;

    let state_path = config.ingest_state_path();
    let mut state = IngestState::load(&state_path).await?;

    let staged = EmailRecord::read_staged(&config.staging_path()).await?;
    let staged_ids: HashSet<String> = staged.records.into_iter().map(|r| r.id).collect();

    let mail =
        collect_mail(mailbox, &mut state, &staged_ids, &attachments_dir, max_emails).await?;
    EmailRecord::append_staged(&config.staging_path(), &mail.records).await?;
    // Persist before the drive pass so a drive failure never re-downloads mail.
    state.save(&state_path).await?;

    let mut report = IngestReport {
        messages_listed: mail.listed,
        messages_staged: mail.records.len(),
        messages_already_staged: mail.already_staged,
        attachments_downloaded: mail.attachments_downloaded,
        ..Default::default()
    };
    let mut failures = mail.failures;

    if let Some(drive) = drive {
        let batch = collect_drive(drive, &mut state, &attachments_dir).await?;
        state.save(&state_path).await?;
        report.drive_downloaded = batch.downloaded.len();
        report.drive_unchanged = batch.unchanged;
        failures.extend(batch.failures);
    }

    for failure in &failures {
        SkippedRecord::record(Stage::Ingest, &failure.record_id, &failure.error, &deps.db_pool)
            .await?;
    }
    report.skipped = failures.len();

    info!(
        listed = report.messages_listed,
        staged = report.messages_staged,
        attachments = report.attachments_downloaded,
        drive_downloaded = report.drive_downloaded,
        drive_unchanged = report.drive_unchanged,
        skipped = report.skipped,
        "Ingestion stage finished"
    );
    Ok(report)
}

/// Fetch new inbox messages and their PDF attachments.
///
/// A message is staged only when all of its PDFs were saved; otherwise it is
/// reported as a failure and picked up again on the next run, without
/// re-downloading the attachments that did succeed.
pub async fn collect_mail(
    mailbox: &dyn BaseMailbox,
    state: &mut IngestState,
    staged_ids: &HashSet<String>,
    attachments_dir: &Path,
    max_emails: u32,
) -> Result<MailBatch> {
    let ids = mailbox.list_message_ids(max_emails).await?;
    let mut batch = MailBatch {
        listed: ids.len(),
        ..Default::default()
    };

    for id in ids {
        if staged_ids.contains(&id) {
            batch.already_staged += 1;
            continue;
        }

        let message = match mailbox.get_message(&id).await {
            Ok(message) => message,
            Err(e) if e.is_skippable() => {
                batch.failures.push(IngestFailure {
                    record_id: id,
                    error: e,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        match save_attachments(mailbox, state, &message, attachments_dir).await {
            Ok((paths, downloaded)) => {
                batch.attachments_downloaded += downloaded;
                batch.records.push(EmailRecord {
                    id: message.id,
                    sender: message.sender,
                    subject: message.subject,
                    received_at: message.received_at,
                    body: message.body,
                    attachment_paths: paths,
                });
            }
            Err(failure) if failure.error.is_skippable() => batch.failures.push(failure),
            Err(failure) => return Err(failure.error),
        }
    }

    Ok(batch)
}

async fn save_attachments(
    mailbox: &dyn BaseMailbox,
    state: &mut IngestState,
    message: &MailMessage,
    attachments_dir: &Path,
) -> std::result::Result<(Vec<PathBuf>, usize), IngestFailure> {
    let mut paths = Vec::new();
    let mut downloaded = 0;

    for attachment in message.attachments.iter().filter(|a| a.is_pdf()) {
        let path = attachments_dir.join(attachment_file_name(&message.id, &attachment.filename));
        let known = state.has_attachment(&message.id, &attachment.attachment_id);
        if known && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "Attachment already downloaded");
            paths.push(path);
            continue;
        }

        let saved = async {
            let bytes = mailbox
                .get_attachment(&message.id, &attachment.attachment_id)
                .await?;
            tokio::fs::write(&path, bytes).await?;
            Ok::<_, PipelineError>(())
        }
        .await;

        if let Err(error) = saved {
            return Err(IngestFailure {
                record_id: format!("{}:{}", message.id, attachment.filename),
                error,
            });
        }
        state.record_attachment(&message.id, &attachment.attachment_id);
        downloaded += 1;
        paths.push(path);
    }

    Ok((paths, downloaded))
}

/// Download new and changed drive files as PDFs.
pub async fn collect_drive(
    drive: &dyn BaseDrive,
    state: &mut IngestState,
    attachments_dir: &Path,
) -> Result<DriveBatch> {
    let files = drive.list_files().await?;
    let mut batch = DriveBatch::default();

    for file in files {
        let status = state.drive_status(&file);
        if status == DriveStatus::Unchanged {
            batch.unchanged += 1;
            continue;
        }

        let path = attachments_dir.join(local_pdf_name(&file));
        let saved = async {
            let bytes = drive.download_pdf(&file).await?;
            tokio::fs::write(&path, bytes).await?;
            Ok::<_, PipelineError>(())
        }
        .await;

        match saved {
            Ok(()) => {
                debug!(file = %file.name, ?status, "Drive file downloaded");
                state.record_drive_file(&file, path.clone());
                batch.downloaded.push(path);
            }
            Err(e) if e.is_skippable() => batch.failures.push(IngestFailure {
                record_id: format!("drive:{}", file.id),
                error: e,
            }),
            Err(e) => return Err(e),
        }
    }

    Ok(batch)
}

/// `<message id>_<file name>`, safe to join onto the attachments directory.
pub fn attachment_file_name(message_id: &str, filename: &str) -> String {
    format!("{}_{}", sanitize_filename(message_id), sanitize_filename(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{DriveFile, MailAttachment, MockDrive, MockMailbox};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("integraldb-ingest-{}", uuid::Uuid::new_v4()))
    }

    fn message(id: &str, attachments: Vec<MailAttachment>) -> MailMessage {
        MailMessage {
            id: id.to_string(),
            sender: "sales@acme.test".to_string(),
            subject: "Price list".to_string(),
            received_at: None,
            body: "Hex bolts M8, $0.12 each".to_string(),
            attachments,
        }
    }

    fn pdf(id: &str, filename: &str) -> MailAttachment {
        MailAttachment {
            attachment_id: id.to_string(),
            filename: filename.to_string(),
            mime_type: "application/pdf".to_string(),
        }
    }

    fn drive_file(id: &str, modified: &str) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: "Catalog".to_string(),
            mime_type: "application/vnd.google-apps.document".to_string(),
            modified_time: modified.to_string(),
        }
    }

    #[tokio::test]
    async fn test_collect_mail_saves_pdfs_and_builds_records() {
        let dir = temp_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let logo = MailAttachment {
            attachment_id: "img".into(),
            filename: "logo.png".into(),
            mime_type: "image/png".into(),
        };
        let mailbox = MockMailbox::new()
            .with_message(message("m1", vec![pdf("a1", "prices.pdf"), logo]))
            .with_attachment("m1", "a1", b"%PDF-1.4 prices");

        let mut state = IngestState::default();
        let batch = collect_mail(&mailbox, &mut state, &HashSet::new(), &dir, 10)
            .await
            .unwrap();

        assert_eq!(batch.records.len(), 1);
        assert!(batch.failures.is_empty());
        let expected = dir.join("m1_prices.pdf");
        assert_eq!(batch.records[0].attachment_paths, vec![expected.clone()]);
        assert_eq!(tokio::fs::read(&expected).await.unwrap(), b"%PDF-1.4 prices");
        assert!(state.has_attachment("m1", "a1"));
        // The image was never requested.
        assert_eq!(mailbox.attachment_calls().len(), 1);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_already_staged_messages_are_not_fetched_again() {
        let dir = temp_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let mailbox = MockMailbox::new()
            .with_message(message("m1", vec![pdf("a1", "prices.pdf")]))
            .with_attachment("m1", "a1", b"%PDF");

        let staged: HashSet<String> = ["m1".to_string()].into_iter().collect();
        let batch = collect_mail(&mailbox, &mut IngestState::default(), &staged, &dir, 10)
            .await
            .unwrap();

        assert!(batch.records.is_empty());
        assert_eq!(batch.already_staged, 1);
        assert!(mailbox.attachment_calls().is_empty());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_attachment_holds_back_message() {
        let dir = temp_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        // a2 has no bytes queued, so the mock reports it as transient.
        let mailbox = MockMailbox::new()
            .with_message(message("m1", vec![pdf("a1", "one.pdf"), pdf("a2", "two.pdf")]))
            .with_message(message("m2", vec![]))
            .with_attachment("m1", "a1", b"%PDF one");

        let mut state = IngestState::default();
        let batch = collect_mail(&mailbox, &mut state, &HashSet::new(), &dir, 10)
            .await
            .unwrap();

        let staged: Vec<&str> = batch.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(staged, vec!["m2"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].record_id, "m1:two.pdf");
        assert!(matches!(batch.failures[0].error, PipelineError::Transient(_)));
        // The attachment that did arrive is remembered for the retry.
        assert!(state.has_attachment("m1", "a1"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_collect_drive_skips_unchanged_files() {
        let dir = temp_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let mut state = IngestState::default();
        let v1 = MockDrive::new().with_file(drive_file("d1", "t1"), b"%PDF v1");
        let first = collect_drive(&v1, &mut state, &dir).await.unwrap();
        assert_eq!(first.downloaded, vec![dir.join("Catalog.pdf")]);

        let again = MockDrive::new().with_file(drive_file("d1", "t1"), b"%PDF v1");
        let second = collect_drive(&again, &mut state, &dir).await.unwrap();
        assert_eq!(second.unchanged, 1);
        assert!(again.downloaded().is_empty());

        let v2 = MockDrive::new().with_file(drive_file("d1", "t2"), b"%PDF v2");
        let third = collect_drive(&v2, &mut state, &dir).await.unwrap();
        assert_eq!(third.downloaded.len(), 1);
        assert_eq!(tokio::fs::read(dir.join("Catalog.pdf")).await.unwrap(), b"%PDF v2");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn test_attachment_file_name() {
        assert_eq!(attachment_file_name("18c2", "Q1 prices.pdf"), "18c2_Q1 prices.pdf");
        assert_eq!(attachment_file_name("18c2", "../x.pdf"), "18c2__x.pdf");
    }
}
