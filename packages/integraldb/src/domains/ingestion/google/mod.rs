//! Google mail and drive clients behind the kernel's mailbox and drive traits.

pub mod auth;
pub mod drive;
pub mod gmail;

pub use auth::{AuthorizedUser, GoogleAuth};
pub use drive::{local_pdf_name, DriveClient};
pub use gmail::GmailClient;

use std::sync::Arc;

use openai_client::RetryPolicy;

use crate::common::{PipelineError, Result};
use crate::config::GoogleConfig;

/// Both clients sharing one token cache.
pub async fn connect(
    config: &GoogleConfig,
    retry: RetryPolicy,
) -> Result<(GmailClient, DriveClient)> {
    let http = reqwest::Client::new();
    let auth = Arc::new(GoogleAuth::from_config(http.clone(), config).await?);
    Ok((
        GmailClient::new(http.clone(), auth.clone()).with_retry_policy(retry),
        DriveClient::new(http, auth).with_retry_policy(retry),
    ))
}

/// Map non-success statuses onto the error taxonomy: 429 and 5xx are
/// transient, everything else is a remote rejection.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{} {}", status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        Err(PipelineError::Transient(message))
    } else {
        Err(PipelineError::Remote(message))
    }
}

/// Replace path separators and control characters so a remote file name
/// can't escape the attachments directory.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}
