use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;
use openai_client::RetryPolicy;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domains::documents::chunking::ChunkingConfig;

/// Width of the `document_chunks.embedding` column.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Which query router the query stage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    /// Keyword and catalog-name heuristics
    Rules,
    /// Generation service plans the search, rules as fallback
    Model,
}

impl FromStr for RouterKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rules" | "rule" => Ok(RouterKind::Rules),
            "model" | "llm" => Ok(RouterKind::Model),
            other => bail!("unknown query router '{}', expected 'rules' or 'model'", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub chunking: ChunkingConfig,
    pub match_count: i32,
    pub match_threshold: f64,
    pub context_char_budget: usize,
    pub query_router: RouterKind,
    pub max_retries: u32,
    pub data_dir: PathBuf,
    pub update_interval_secs: u64,
    pub max_emails: u32,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Missing keys fall back to defaults; present
    /// but malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| unquote(&v)).filter(|v| !v.is_empty());

        let chunk_size: usize = parse_or(&get, "CHUNK_SIZE", 1000)?;
        let chunk_overlap: usize = parse_or(&get, "CHUNK_OVERLAP", 200)?;
        let chunking = ChunkingConfig::new(chunk_size, chunk_overlap)
            .context("CHUNK_SIZE / CHUNK_OVERLAP are invalid")?;

        let match_threshold: f64 = parse_or(&get, "MATCH_THRESHOLD", 0.4)?;
        if !(-1.0..=1.0).contains(&match_threshold) {
            bail!("MATCH_THRESHOLD must be between -1 and 1, got {}", match_threshold);
        }
        let match_count: i32 = parse_or(&get, "MATCH_COUNT", 5)?;
        if match_count < 1 {
            bail!("MATCH_COUNT must be at least 1, got {}", match_count);
        }

        Ok(Self {
            database_url: get("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or(&get, "PORT", 8080)?,
            openai_api_key: get("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: get("OPENAI_BASE_URL"),
            chat_model: get("CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            chunking,
            match_count,
            match_threshold,
            context_char_budget: parse_or(&get, "CONTEXT_CHAR_BUDGET", 12_000)?,
            query_router: parse_or(&get, "QUERY_ROUTER", RouterKind::Rules)?,
            max_retries: parse_or(&get, "MAX_RETRIES", 3)?,
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            update_interval_secs: parse_or(&get, "UPDATE_INTERVAL_SECS", 3600)?,
            max_emails: parse_or(&get, "MAX_EMAILS", 10)?,
        })
    }

    /// Backoff for every remote call: OpenAI, mail, drive.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }

    /// Downloaded PDFs from mail and drive.
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    /// Staged email records, one JSON object per line.
    pub fn staging_path(&self) -> PathBuf {
        self.data_dir.join("emails.jsonl")
    }

    /// Differential ingestion state.
    pub fn ingest_state_path(&self) -> PathBuf {
        self.data_dir.join("ingest_state.json")
    }
}

/// Credentials for the mail/drive service. Only the ingest stage needs these.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Authorized-user JSON holding `client_id`, `client_secret`, `refresh_token`
    pub token_path: PathBuf,
    pub token_uri: String,
}

impl GoogleConfig {
    pub fn from_env(data_dir: &std::path::Path) -> Self {
        let _ = dotenv();
        Self {
            token_path: env::var("GOOGLE_TOKEN_PATH")
                .map(|v| PathBuf::from(unquote(&v)))
                .unwrap_or_else(|_| data_dir.join("credentials").join("token.json")),
            token_uri: env::var("GOOGLE_TOKEN_URI")
                .map(|v| unquote(&v))
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string()),
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_string()
}
