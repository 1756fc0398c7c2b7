//! MongoDB connection management

use crate::config::DigestConfig;
use crate::error::Result;
use mongodb::options::ClientOptions;
use mongodb::Client;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the seen-URL collection
#[derive(Debug, Clone)]
pub struct MongoSettings {
    pub connection_string: String,
    pub db_name: String,
    pub collection_name: String,
}

/// Create a MongoDB client
///
/// # Example
/// ```ignore
/// let client = connect("mongodb://localhost:27017").await?;
/// ```
pub async fn connect(connection_string: &str) -> Result<Client> {
    let mut options = ClientOptions::parse(connection_string).await?;
    options.app_name = Some("affairs-digest".to_string());
    options.server_selection_timeout = Some(Duration::from_secs(30));
    options.max_pool_size = Some(5);

    let client = Client::with_options(options)?;
    debug!("MongoDB client created");
    Ok(client)
}

/// Create a client from the Mongo settings of a [`DigestConfig`]
pub async fn connect_from_config(config: &DigestConfig) -> Result<(Client, MongoSettings)> {
    let settings = config.mongo()?;
    let client = connect(&settings.connection_string).await?;
    Ok((client, settings))
}
