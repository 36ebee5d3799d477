//! Gmail REST client: inbox listing, full message payloads, attachments.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use openai_client::RetryPolicy;
use serde::Deserialize;
use tracing::debug;

use super::{check_status, GoogleAuth};
use crate::common::{PipelineError, Result};
use crate::kernel::{BaseMailbox, MailAttachment, MailMessage};

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

pub struct GmailClient {
    http: reqwest::Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
    retry: RetryPolicy,
}

impl GmailClient {
    pub fn new(http: reqwest::Client, auth: Arc<GoogleAuth>) -> Self {
        Self {
            http,
            auth,
            base_url: GMAIL_API.to_string(),
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

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
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
                check_status(response)
                    .await?
                    .json::<T>()
                    .await
                    .map_err(|e| PipelineError::Remote(format!("gmail {}: {}", path, e)))
            })
            .await
    }
}

#[async_trait]
impl BaseMailbox for GmailClient {
    async fn list_message_ids(&self, max: u32) -> Result<Vec<String>> {
        let list: MessageList = self
            .get(
                "messages",
                &[
                    ("labelIds", "INBOX".to_string()),
                    ("maxResults", max.to_string()),
                ],
            )
            .await?;
        debug!(count = list.messages.len(), "Listed inbox messages");
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, id: &str) -> Result<MailMessage> {
        let raw: RawMessage = self
            .get(&format!("messages/{}", id), &[("format", "full".to_string())])
            .await?;
        Ok(raw.into_mail_message())
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let body: PartBody = self
            .get(
                &format!("messages/{}/attachments/{}", message_id, attachment_id),
                &[],
            )
            .await?;
        let data = body.data.ok_or_else(|| {
            PipelineError::Remote(format!("attachment {} has no data", attachment_id))
        })?;
        decode_base64url(&data)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    /// Milliseconds since the epoch, as a string
    internal_date: Option<String>,
    payload: MessagePart,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: PartBody,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartBody {
    attachment_id: Option<String>,
    data: Option<String>,
}

impl RawMessage {
    fn into_mail_message(self) -> MailMessage {
        let header = |name: &str| {
            self.payload
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.clone())
        };

        let received_at = header("Date")
            .and_then(|d| parse_mail_date(&d))
            .or_else(|| {
                self.internal_date
                    .as_deref()
                    .and_then(|ms| ms.parse::<i64>().ok())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            });

        let mut attachments = Vec::new();
        collect_attachments(&self.payload, &mut attachments);

        MailMessage {
            sender: header("From").unwrap_or_default(),
            subject: header("Subject").unwrap_or_default(),
            received_at,
            body: plain_text_body(&self.payload).unwrap_or_default(),
            attachments,
            id: self.id,
        }
    }
}

/// First `text/plain` part, depth first.
fn plain_text_body(part: &MessagePart) -> Option<String> {
    if part.mime_type == "text/plain" && part.filename.is_empty() {
        if let Some(data) = &part.body.data {
            return decode_base64url(data)
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    part.parts.iter().find_map(plain_text_body)
}

fn collect_attachments(part: &MessagePart, out: &mut Vec<MailAttachment>) {
    if let Some(attachment_id) = &part.body.attachment_id {
        if !part.filename.is_empty() {
            out.push(MailAttachment {
                attachment_id: attachment_id.clone(),
                filename: part.filename.clone(),
                mime_type: part.mime_type.clone(),
            });
        }
    }
    for child in &part.parts {
        collect_attachments(child, out);
    }
}

/// RFC 2822 date, tolerating a trailing `(UTC)`-style comment.
fn parse_mail_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = match value.find(" (") {
        Some(idx) => &value[..idx],
        None => value,
    };
    DateTime::parse_from_rfc2822(trimmed.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Gmail encodes bodies as base64url, with or without padding.
fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|e| PipelineError::Remote(format!("invalid base64 payload: {}", e)))
}
