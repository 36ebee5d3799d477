//! OAuth access tokens for the mail and drive APIs.
//!
//! The interactive consent flow happens outside this crate; it leaves an
//! authorized-user JSON file with a refresh token, which is exchanged here
//! for short-lived access tokens.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::common::{PipelineError, Result};
use crate::config::GoogleConfig;

/// Refresh this long before the provider's expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct GoogleAuth {
    http: reqwest::Client,
    credentials: AuthorizedUser,
    token_uri: String,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(http: reqwest::Client, credentials: AuthorizedUser, token_uri: String) -> Self {
        Self {
            http,
            credentials,
            token_uri,
            cached: Mutex::new(None),
        }
    }

    /// Read the authorized-user file. A missing or malformed file is a
    /// configuration error.
    pub async fn from_config(http: reqwest::Client, config: &GoogleConfig) -> Result<Self> {
        let credentials = load_authorized_user(&config.token_path).await?;
        Ok(Self::new(http, credentials, config.token_uri.clone()))
    }

    /// A valid access token, refreshed when missing or about to expire.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.refresh().await?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    async fn refresh(&self) -> Result<TokenResponse> {
        debug!(token_uri = %self.token_uri, "Refreshing access token");
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Config(format!(
                "refresh token rejected ({}): {}",
                status, body
            )));
        }
        let response = super::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| PipelineError::Remote(format!("token response: {}", e)))
    }
}

async fn load_authorized_user(path: &Path) -> Result<AuthorizedUser> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        PipelineError::Config(format!(
            "cannot read mail credentials at {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_authorized_user(&content)
}

fn parse_authorized_user(content: &str) -> Result<AuthorizedUser> {
    serde_json::from_str(content)
        .map_err(|e| PipelineError::Config(format!("malformed mail credentials: {}", e)))
}
