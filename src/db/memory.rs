//! In-memory seen-URL ledger
//!
//! Used when no database is involved (rendering, tests).

use crate::db::SeenUrlLedger;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryLedger {
    urls: Mutex<HashSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger pre-populated with URLs
    pub fn with_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: Mutex::new(urls.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.urls.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.urls.lock().await.is_empty()
    }
}

#[async_trait]
impl SeenUrlLedger for MemoryLedger {
    async fn contains(&self, url: &str) -> Result<bool> {
        Ok(self.urls.lock().await.contains(url))
    }

    async fn insert(&self, url: &str) -> Result<()> {
        self.urls.lock().await.insert(url.to_string());
        Ok(())
    }

    async fn remove(&self, url: &str) -> Result<bool> {
        Ok(self.urls.lock().await.remove(url))
    }
}
