//! Database module for affairs-digest
//!
//! Keeps the ledger of article URLs that were already published, so each
//! article goes out at most once.

pub mod connection;
pub mod memory;
pub mod seen_urls;

pub use connection::{connect, connect_from_config, MongoSettings};
pub use memory::MemoryLedger;
pub use seen_urls::{filter_new_urls, is_quiz_url, MongoLedger, SeenUrl, SeenUrlLedger};
