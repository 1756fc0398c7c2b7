//! Template location handling

use crate::crawler::Crawler;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

const SHARE_SUFFIX: &str = "/edit?usp=sharing";
const EXPORT_SUFFIX: &str = "/export?format=docx";

/// Rewrite a Google Docs share link into its DOCX export link
///
/// Other URLs are returned unchanged.
pub fn export_url(url: &str) -> String {
    url.replace(SHARE_SUFFIX, EXPORT_SUFFIX)
}

/// Where the DOCX template comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Remote(String),
    Local(PathBuf),
}

impl TemplateSource {
    /// Interpret a location: `http(s)://` is remote, anything else a file path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            TemplateSource::Remote(trimmed.to_string())
        } else {
            TemplateSource::Local(PathBuf::from(trimmed))
        }
    }

    /// Load the template bytes
    pub async fn load(&self, crawler: &Crawler) -> Result<Vec<u8>> {
        match self {
            TemplateSource::Remote(url) => {
                let download_url = export_url(url);
                info!("Downloading template from {}", download_url);
                crawler.fetch_bytes(&download_url).await
            }
            TemplateSource::Local(path) => load_local(path).await,
        }
    }
}

async fn load_local(path: &Path) -> Result<Vec<u8>> {
    info!("Reading template from {}", path.display());
    Ok(tokio::fs::read(path).await?)
}
