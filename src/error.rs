//! Error types for affairs-digest

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Failed to fetch URL: {url}")]
    FetchError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for URL: {url}")]
    HttpStatusError { url: String, status: u16 },

    #[error("Failed to fetch URL after {attempts} attempts: {url} (last error: {last_error})")]
    RetryExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Failed to parse HTML: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("File system error")]
    FsError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid DOCX archive: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("Invalid DOCX document: {0}")]
    DocumentError(String),

    #[error("Could not find both START_CONTENT and END_CONTENT placeholders in the template")]
    PlaceholderMissing,

    #[error("PDF conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
