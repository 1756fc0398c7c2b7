//! Telegram Bot API client for publishing the digest

use crate::error::{DigestError, Result};
use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Maximum caption length accepted by `sendDocument`
pub const MAX_CAPTION_CHARS: usize = 1024;

/// Configuration for the Telegram client
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API base URL (default: https://api.telegram.org)
    pub api_base: String,
    /// Per-request timeout, including the upload (default: 60 seconds)
    pub request_timeout: Duration,
    /// Attempts made when a request times out (default: 3)
    pub max_attempts: u32,
    /// Pause after a timed-out attempt (default: 5 seconds)
    pub retry_delay: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(60),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Client for a single bot
pub struct TelegramClient {
    client: Client,
    token: String,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_config(token, TelegramConfig::default())
    }

    pub fn with_config(token: &str, config: TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DigestError::FetchError {
                url: "client_init".to_string(),
                source: e,
            })?;

        Ok(Self {
            client,
            token: token.to_string(),
            config,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.token,
            method
        )
    }

    /// Upload a file to a chat as a document
    ///
    /// Timeouts are retried; any other failure is returned immediately.
    pub async fn send_document(&self, chat_id: &str, path: &Path, caption: &str) -> Result<()> {
        info!("Sending PDF to Telegram channel {}", chat_id);

        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "digest.pdf".to_string());

        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            match self.send_once(chat_id, &file_name, data.clone(), caption).await {
                Ok(()) => {
                    info!("Document {} delivered on attempt {}", file_name, attempt);
                    return Ok(());
                }
                Err(DigestError::FetchError { source, .. }) if source.is_timeout() => {
                    last_error = source.to_string();
                    warn!(
                        "Timeout error while sending PDF to Telegram (attempt {}/{}): {}",
                        attempt, self.config.max_attempts, last_error
                    );
                    if attempt < self.config.max_attempts {
                        sleep(self.config.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(DigestError::RetryExhausted {
            url: self.method_url("sendDocument").replace(&self.token, "<token>"),
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    async fn send_once(
        &self,
        chat_id: &str,
        file_name: &str,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        let url = self.method_url("sendDocument");
        let redacted = url.replace(&self.token, "<token>");

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| DigestError::FetchError {
                url: redacted.clone(),
                source: e,
            })?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DigestError::FetchError {
                url: redacted.clone(),
                source: e.without_url(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| DigestError::FetchError {
            url: redacted.clone(),
            source: e.without_url(),
        })?;
        debug!("sendDocument responded {}: {}", status, body);

        match serde_json::from_str::<ApiResponse>(&body) {
            Ok(api) if api.ok => Ok(()),
            Ok(api) => Err(DigestError::TelegramError(
                api.description
                    .unwrap_or_else(|| format!("request failed with status {}", status)),
            )),
            Err(_) if !status.is_success() => Err(DigestError::HttpStatusError {
                url: redacted,
                status: status.as_u16(),
            }),
            Err(e) => Err(DigestError::TelegramError(format!(
                "unexpected response: {}",
                e
            ))),
        }
    }
}

/// Build the channel caption for a digest
///
/// Title lines are dropped from the end until the caption fits the
/// `sendDocument` limit; the header and closing line are always kept.
pub fn build_caption(date: NaiveDate, titles: &[String], promo_line: &str) -> String {
    let header = format!("🎗️ {} Current Affairs 🎗️", date.format("%d %B %Y"));
    let mut lines: Vec<String> = titles.iter().map(|t| format!("👉 {}", t)).collect();

    loop {
        let caption = format!("{}\n\n{}\n\n{}", header, lines.join("\n"), promo_line);
        let len = caption.chars().count();
        if len <= MAX_CAPTION_CHARS {
            return caption;
        }
        if lines.pop().is_none() {
            return caption.chars().take(MAX_CAPTION_CHARS).collect();
        }
    }
}
