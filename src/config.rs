//! Digest configuration
//!
//! Values come from the environment (optionally via a `.env` file) and can be
//! overridden from the command line. Required groups are only checked when
//! the step that needs them runs.

use crate::crawler::{DEFAULT_BASE_URL, DEFAULT_PAGES};
use crate::db::MongoSettings;
use crate::error::{DigestError, Result};
use std::env;

pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_COLLECTION_NAME: &str = "COLLECTION_NAME";
pub const ENV_MONGO_CONNECTION_STRING: &str = "MONGO_CONNECTION_STRING";
pub const ENV_TEMPLATE_URL: &str = "TEMPLATE_URL";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHANNEL_ID: &str = "TELEGRAM_CHANNEL_ID";
pub const ENV_BASE_URL: &str = "DIGEST_BASE_URL";
pub const ENV_PAGES: &str = "DIGEST_PAGES";
pub const ENV_PROMO_LINE: &str = "DIGEST_PROMO_LINE";

/// Closing line of the channel caption
pub const DEFAULT_PROMO_LINE: &str = "🎉 Join us :- @Daily_Current_All_Source 🎉";

/// Digest configuration
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub db_name: Option<String>,
    pub collection_name: Option<String>,
    pub mongo_connection_string: Option<String>,
    pub template_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: Option<String>,

    /// First listing page
    pub base_url: String,

    /// Number of listing pages to walk
    pub pages: u32,

    /// Closing line of the caption
    pub promo_line: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            db_name: None,
            collection_name: None,
            mongo_connection_string: None,
            template_url: None,
            telegram_bot_token: None,
            telegram_channel_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            pages: DEFAULT_PAGES,
            promo_line: DEFAULT_PROMO_LINE.to_string(),
        }
    }
}

/// Telegram destination and credentials
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub channel_id: String,
}

impl DigestConfig {
    /// Create a new config builder
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder::default()
    }

    /// Load configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            db_name: get(ENV_DB_NAME),
            collection_name: get(ENV_COLLECTION_NAME),
            mongo_connection_string: get(ENV_MONGO_CONNECTION_STRING),
            template_url: get(ENV_TEMPLATE_URL),
            telegram_bot_token: get(ENV_TELEGRAM_BOT_TOKEN),
            telegram_channel_id: get(ENV_TELEGRAM_CHANNEL_ID),
            base_url: get(ENV_BASE_URL).unwrap_or(defaults.base_url),
            pages: get(ENV_PAGES)
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.pages),
            promo_line: get(ENV_PROMO_LINE).unwrap_or(defaults.promo_line),
        }
    }

    /// Mongo settings; all three variables must be set
    pub fn mongo(&self) -> Result<MongoSettings> {
        match (
            &self.mongo_connection_string,
            &self.db_name,
            &self.collection_name,
        ) {
            (Some(connection_string), Some(db_name), Some(collection_name)) => Ok(MongoSettings {
                connection_string: connection_string.clone(),
                db_name: db_name.clone(),
                collection_name: collection_name.clone(),
            }),
            _ => Err(DigestError::ConfigError(format!(
                "One or more required MongoDB environment variables are not set ({}, {}, {})",
                ENV_DB_NAME, ENV_COLLECTION_NAME, ENV_MONGO_CONNECTION_STRING
            ))),
        }
    }

    /// Template location
    pub fn template_url(&self) -> Result<&str> {
        self.template_url
            .as_deref()
            .ok_or_else(|| DigestError::ConfigError(format!("{} is not set", ENV_TEMPLATE_URL)))
    }

    /// Telegram settings; both variables must be set
    pub fn telegram(&self) -> Result<TelegramSettings> {
        match (&self.telegram_bot_token, &self.telegram_channel_id) {
            (Some(bot_token), Some(channel_id)) => Ok(TelegramSettings {
                bot_token: bot_token.clone(),
                channel_id: channel_id.clone(),
            }),
            _ => Err(DigestError::ConfigError(format!(
                "{} or {} is not set",
                ENV_TELEGRAM_BOT_TOKEN, ENV_TELEGRAM_CHANNEL_ID
            ))),
        }
    }
}

/// Builder for DigestConfig
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl DigestConfigBuilder {
    /// Start from an existing config (e.g. one loaded from the environment)
    pub fn from_config(config: DigestConfig) -> Self {
        Self { config }
    }

    /// Set the listing base URL
    pub fn base_url(mut self, url: &str) -> Self {
        self.config.base_url = url.to_string();
        self
    }

    /// Set the number of listing pages
    pub fn pages(mut self, pages: u32) -> Self {
        self.config.pages = pages;
        self
    }

    /// Set the template location
    pub fn template_url(mut self, url: &str) -> Self {
        self.config.template_url = Some(url.to_string());
        self
    }

    /// Set the Mongo connection
    pub fn mongo(mut self, connection_string: &str, db_name: &str, collection_name: &str) -> Self {
        self.config.mongo_connection_string = Some(connection_string.to_string());
        self.config.db_name = Some(db_name.to_string());
        self.config.collection_name = Some(collection_name.to_string());
        self
    }

    /// Set the Telegram bot token and channel
    pub fn telegram(mut self, bot_token: &str, channel_id: &str) -> Self {
        self.config.telegram_bot_token = Some(bot_token.to_string());
        self.config.telegram_channel_id = Some(channel_id.to_string());
        self
    }

    /// Set the caption closing line
    pub fn promo_line(mut self, line: &str) -> Self {
        self.config.promo_line = line.to_string();
        self
    }

    /// Build the config
    pub fn build(self) -> DigestConfig {
        self.config
    }
}

impl Default for DigestConfigBuilder {
    fn default() -> Self {
        Self {
            config: DigestConfig::default(),
        }
    }
}
