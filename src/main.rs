//! Affairs Digest CLI
//!
//! Publishes the daily current-affairs digest. Besides the full `run`, the
//! individual stages can be exercised on their own (crawl, render) and
//! published URLs can be forgotten so they go out again.

use affairs_digest::config::DigestConfigBuilder;
use affairs_digest::db::{connect_from_config, MongoLedger, SeenUrlLedger};
use affairs_digest::logging::{self, LoggingOptions, DEFAULT_LOG_FILE};
use affairs_digest::{
    render_digest, run_digest, Crawler, DigestConfig, DigestOutcome, RunOptions, TemplateSource,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "affairs-digest")]
#[command(about = "Publish a daily current-affairs PDF digest to a Telegram channel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log file path
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Disable the log file
    #[arg(long, global = true)]
    no_log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl, deduplicate, render and publish the digest
    Run {
        /// Number of listing pages to crawl (default: DIGEST_PAGES or 3)
        #[arg(short, long)]
        pages: Option<u32>,

        /// First listing page (default: DIGEST_BASE_URL or the current-affairs section)
        #[arg(long)]
        base_url: Option<String>,

        /// Copy the generated DOCX and PDF into this directory
        #[arg(long)]
        keep_files: Option<PathBuf>,
    },

    /// List article URLs from the listing (without database or Telegram)
    Crawl {
        /// Number of listing pages to crawl
        #[arg(short, long)]
        pages: Option<u32>,

        /// First listing page
        #[arg(long)]
        base_url: Option<String>,

        /// Also scrape every article and show its content blocks
        #[arg(long)]
        scrape: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render the digest locally without deduplication or publishing
    Render {
        /// Output directory for the DOCX and PDF
        #[arg(short, long, default_value = "./digest")]
        output: PathBuf,

        /// Template URL or path (default: TEMPLATE_URL)
        #[arg(short, long)]
        template: Option<String>,

        /// Only write the DOCX
        #[arg(long)]
        no_pdf: bool,

        /// Article URLs (default: a fresh crawl of the listing)
        urls: Vec<String>,
    },

    /// Remove URLs from the published ledger so they are sent again
    Forget {
        /// Article URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

fn apply_listing_overrides(
    config: DigestConfig,
    pages: Option<u32>,
    base_url: Option<String>,
) -> DigestConfig {
    let mut builder = DigestConfigBuilder::from_config(config);
    if let Some(pages) = pages {
        builder = builder.pages(pages);
    }
    if let Some(base_url) = base_url {
        builder = builder.base_url(&base_url);
    }
    builder.build()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let _log_guard = logging::init(&LoggingOptions {
        verbose: cli.verbose,
        log_file: if cli.no_log_file {
            None
        } else {
            Some(cli.log_file.clone())
        },
    })?;

    let config = DigestConfig::from_env();

    match cli.command {
        Commands::Run {
            pages,
            base_url,
            keep_files,
        } => {
            info!("Script started");
            let config = apply_listing_overrides(config, pages, base_url);

            let (client, settings) = connect_from_config(&config).await?;
            let ledger = MongoLedger::new(&client, &settings);
            info!("Database connection established");

            let outcome = run_digest(&config, &ledger, &RunOptions { keep_files }).await?;
            match outcome {
                DigestOutcome::NothingNew => println!("No new articles to publish"),
                DigestOutcome::NoContent { urls } => {
                    println!("{} new articles found but none could be scraped", urls.len())
                }
                DigestOutcome::Published { file_name, titles } => {
                    println!("\nDigest published successfully!");
                    println!("  File: {}", file_name);
                    println!("  Articles:");
                    for title in titles {
                        println!("    - {}", title);
                    }
                }
            }
            info!("Script finished");
        }

        Commands::Crawl {
            pages,
            base_url,
            scrape,
            json,
        } => {
            let config = apply_listing_overrides(config, pages, base_url);
            let crawler = Crawler::new()?;
            let urls = crawler
                .fetch_article_urls(&config.base_url, config.pages)
                .await;

            if scrape {
                let articles = affairs_digest::scrape_articles(&crawler, &urls).await;
                if json {
                    println!("{}", serde_json::to_string_pretty(&articles)?);
                } else {
                    for article in &articles {
                        println!("=== {} ===", article.title);
                        println!("URL: {}", article.url);
                        for block in &article.blocks {
                            println!("  [{}] {}", block.kind(), block.text());
                        }
                        println!();
                    }
                    println!("{} of {} articles scraped", articles.len(), urls.len());
                }
            } else if json {
                println!("{}", serde_json::to_string_pretty(&urls)?);
            } else {
                println!("=== Articles ({} links) ===", urls.len());
                for url in &urls {
                    println!("  - {}", url);
                }
            }
        }

        Commands::Render {
            output,
            template,
            no_pdf,
            urls,
        } => {
            let location = match template {
                Some(t) => t,
                None => config.template_url()?.to_string(),
            };
            let source = TemplateSource::parse(&location);
            let urls = if urls.is_empty() { None } else { Some(urls) };

            let rendered = render_digest(&config, &source, urls, &output, !no_pdf).await?;

            println!("\nDigest rendered successfully!");
            println!("  DOCX: {}", rendered.docx_path.display());
            if let Some(pdf) = &rendered.pdf_path {
                println!("  PDF:  {}", pdf.display());
            }
            println!("  Articles:");
            for title in &rendered.titles {
                println!("    - {}", title);
            }
        }

        Commands::Forget { urls } => {
            let (client, settings) = connect_from_config(&config).await?;
            let ledger = MongoLedger::new(&client, &settings);

            for url in &urls {
                if ledger.remove(url).await? {
                    println!("✓ Forgot {}", url);
                } else {
                    println!("  Not in ledger: {}", url);
                }
            }
        }
    }

    Ok(())
}
