//! Seen-URL ledger operations

use crate::db::MongoSettings;
use crate::error::Result;
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Marker identifying daily quiz posts, which are never published
const QUIZ_URL_MARKER: &str = "daily-current-affairs-quiz";

/// A published article URL, stored as `{ "url": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenUrl {
    pub url: String,
}

/// Storage for URLs that have already been published
#[async_trait]
pub trait SeenUrlLedger: Send + Sync {
    /// Whether the URL was recorded before
    async fn contains(&self, url: &str) -> Result<bool>;

    /// Record the URL
    async fn insert(&self, url: &str) -> Result<()>;

    /// Forget the URL; returns whether it was recorded
    async fn remove(&self, url: &str) -> Result<bool>;
}

/// Ledger backed by a MongoDB collection
pub struct MongoLedger {
    collection: Collection<SeenUrl>,
}

impl MongoLedger {
    pub fn new(client: &Client, settings: &MongoSettings) -> Self {
        let collection = client
            .database(&settings.db_name)
            .collection::<SeenUrl>(&settings.collection_name);
        Self { collection }
    }
}

#[async_trait]
impl SeenUrlLedger for MongoLedger {
    async fn contains(&self, url: &str) -> Result<bool> {
        let found = self.collection.find_one(doc! { "url": url }).await?;
        Ok(found.is_some())
    }

    async fn insert(&self, url: &str) -> Result<()> {
        self.collection
            .insert_one(SeenUrl {
                url: url.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn remove(&self, url: &str) -> Result<bool> {
        let result = self.collection.delete_many(doc! { "url": url }).await?;
        Ok(result.deleted_count > 0)
    }
}

/// Whether the URL points at a daily quiz post
pub fn is_quiz_url(url: &str) -> bool {
    url.contains(QUIZ_URL_MARKER)
}

/// Return the URLs not yet in the ledger, recording each one as it is found
///
/// Quiz posts are skipped. A URL repeated within `urls` is only returned once.
/// On a ledger error the URLs found so far are returned.
pub async fn filter_new_urls(ledger: &dyn SeenUrlLedger, urls: &[String]) -> Vec<String> {
    info!("Checking and inserting {} URLs", urls.len());
    let mut new_urls = Vec::new();

    for url in urls {
        if is_quiz_url(url) {
            debug!("Skipping quiz URL: {}", url);
            continue;
        }

        match record_if_new(ledger, url).await {
            Ok(true) => new_urls.push(url.clone()),
            Ok(false) => debug!("Already published: {}", url),
            Err(e) => {
                error!("Error while checking or inserting URLs: {}", e);
                break;
            }
        }
    }

    info!("{} new URLs", new_urls.len());
    new_urls
}

async fn record_if_new(ledger: &dyn SeenUrlLedger, url: &str) -> Result<bool> {
    if ledger.contains(url).await? {
        return Ok(false);
    }
    ledger.insert(url).await?;
    Ok(true)
}
