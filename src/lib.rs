//! Affairs Digest - publishes a daily current-affairs PDF to a Telegram channel
//!
//! Each run crawls the current-affairs listing, keeps only articles that were
//! not published before, renders them into a DOCX template, converts that to
//! PDF with LibreOffice and sends the PDF to a Telegram channel.
//!
//! The steps are exposed individually so they can be reused by the CLI
//! sub-commands and exercised in tests:
//! - [`collect_new_urls`] - crawl the listing and filter through the ledger
//! - [`scrape_articles`] - turn article pages into content blocks
//! - [`render_docx`] - fill the template
//! - [`write_pdf`] - convert to the dated PDF
//! - [`publish_pdf`] - send it to the channel

pub mod article;
pub mod config;
pub mod converter;
pub mod crawler;
pub mod db;
pub mod docx;
pub mod error;
pub mod logging;
pub mod telegram;
pub mod template;

#[cfg(test)]
mod test_support;

pub use article::{Article, ContentBlock};
pub use config::{DigestConfig, TelegramSettings};
pub use converter::{digest_file_name, PdfConverter};
pub use crawler::{Crawler, CrawlerConfig};
pub use db::{filter_new_urls, MemoryLedger, MongoLedger, SeenUrlLedger};
pub use docx::DocxDocument;
pub use error::{DigestError, Result};
pub use telegram::{build_caption, TelegramClient};
pub use template::TemplateSource;

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Options for a publishing run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Copy the generated DOCX and PDF here before temporary files are removed
    pub keep_files: Option<PathBuf>,
}

/// Result of a publishing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutcome {
    /// The listing had no unpublished articles
    NothingNew,
    /// New URLs were found but none of them could be scraped
    NoContent { urls: Vec<String> },
    /// The digest was sent
    Published {
        file_name: String,
        titles: Vec<String>,
    },
}

/// Files produced by [`render_digest`]
#[derive(Debug, Clone)]
pub struct RenderedDigest {
    pub docx_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
    pub titles: Vec<String>,
}

/// Crawl the listing and return the URLs not yet in the ledger
///
/// Returned URLs are already recorded in the ledger.
pub async fn collect_new_urls(
    crawler: &Crawler,
    ledger: &dyn SeenUrlLedger,
    base_url: &str,
    pages: u32,
) -> Vec<String> {
    let article_urls = crawler.fetch_article_urls(base_url, pages).await;
    filter_new_urls(ledger, &article_urls).await
}

/// Scrape articles in order; pages that fail are logged and left out
pub async fn scrape_articles(crawler: &Crawler, urls: &[String]) -> Vec<Article> {
    let mut articles = Vec::with_capacity(urls.len());
    for url in urls {
        if let Some(article) = crawler.scrape_article(url).await {
            articles.push(article);
        }
    }
    articles
}

/// Fill the template with the blocks of every article, in order
pub fn render_docx(template: &[u8], articles: &[Article]) -> Result<Vec<u8>> {
    let mut document = DocxDocument::from_bytes(template)?;
    let blocks: Vec<ContentBlock> = articles
        .iter()
        .flat_map(|a| a.blocks.iter().cloned())
        .collect();
    document.fill_placeholders(&blocks)?;
    document.to_bytes()
}

/// Write the DOCX into `dir` and convert it to the dated PDF
///
/// Returns the paths of the DOCX and the PDF.
pub async fn write_pdf(
    converter: &PdfConverter,
    docx: &[u8],
    dir: &Path,
    date: NaiveDate,
) -> Result<(PathBuf, PathBuf)> {
    let docx_path = dir.join("digest.docx");
    tokio::fs::write(&docx_path, docx).await?;

    let pdf_path = dir.join(digest_file_name(date));
    converter.convert(&docx_path, &pdf_path).await?;
    Ok((docx_path, pdf_path))
}

/// Send the PDF with a caption listing the article titles
pub async fn publish_pdf(
    settings: &TelegramSettings,
    pdf_path: &Path,
    date: NaiveDate,
    titles: &[String],
    promo_line: &str,
) -> Result<()> {
    let client = TelegramClient::new(&settings.bot_token)?;
    let caption = build_caption(date, titles, promo_line);
    client
        .send_document(&settings.channel_id, pdf_path, &caption)
        .await
}

/// Run the whole pipeline once
///
/// If a step after deduplication fails, the URLs recorded during this run are
/// removed from the ledger again so the next run picks them up.
pub async fn run_digest(
    config: &DigestConfig,
    ledger: &dyn SeenUrlLedger,
    options: &RunOptions,
) -> Result<DigestOutcome> {
    let crawler = Crawler::new()?;

    info!("Step 1: Collecting new article URLs...");
    let new_urls = collect_new_urls(&crawler, ledger, &config.base_url, config.pages).await;
    if new_urls.is_empty() {
        info!("No new URLs found to process");
        return Ok(DigestOutcome::NothingNew);
    }

    match publish_new(config, &crawler, ledger, &new_urls, options).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            error!("An error occurred in the main process: {}", e);
            forget_urls(ledger, &new_urls).await;
            Err(e)
        }
    }
}

async fn publish_new(
    config: &DigestConfig,
    crawler: &Crawler,
    ledger: &dyn SeenUrlLedger,
    new_urls: &[String],
    options: &RunOptions,
) -> Result<DigestOutcome> {
    let template = TemplateSource::parse(config.template_url()?);

    info!("Step 2: Loading template...");
    let template_bytes = template.load(crawler).await?;

    info!("Step 3: Scraping {} articles...", new_urls.len());
    let articles = scrape_articles(crawler, new_urls).await;

    let failed: Vec<String> = new_urls
        .iter()
        .filter(|u| !articles.iter().any(|a| &a.url == *u))
        .cloned()
        .collect();
    if !failed.is_empty() {
        warn!("{} articles could not be scraped and will be retried next run", failed.len());
        forget_urls(ledger, &failed).await;
    }
    if articles.is_empty() {
        return Ok(DigestOutcome::NoContent {
            urls: new_urls.to_vec(),
        });
    }

    info!("Step 4: Rendering digest...");
    let docx = render_docx(&template_bytes, &articles)?;

    let telegram = config.telegram()?;
    let converter = PdfConverter::locate()?;
    let workdir = tempfile::tempdir()?;
    let date = chrono::Local::now().date_naive();

    info!("Step 5: Converting to PDF...");
    let (docx_path, pdf_path) = write_pdf(&converter, &docx, workdir.path(), date).await?;

    if let Some(dir) = &options.keep_files {
        keep_copies(dir, &[docx_path.as_path(), pdf_path.as_path()]).await?;
    }

    let titles: Vec<String> = articles.iter().map(|a| a.title.clone()).collect();

    info!("Step 6: Publishing...");
    publish_pdf(&telegram, &pdf_path, date, &titles, &config.promo_line).await?;

    let file_name = digest_file_name(date);
    info!("✓ Published {} with {} articles", file_name, titles.len());
    Ok(DigestOutcome::Published { file_name, titles })
}

/// Build the digest for the given URLs (or a fresh crawl) without touching
/// the ledger or Telegram
pub async fn render_digest(
    config: &DigestConfig,
    template: &TemplateSource,
    urls: Option<Vec<String>>,
    output_dir: &Path,
    with_pdf: bool,
) -> Result<RenderedDigest> {
    let crawler = Crawler::new()?;

    let urls = match urls {
        Some(urls) if !urls.is_empty() => urls,
        _ => {
            let ledger = MemoryLedger::new();
            collect_new_urls(&crawler, &ledger, &config.base_url, config.pages).await
        }
    };
    if urls.is_empty() {
        return Err(DigestError::ParseError("no article URLs to render".to_string()));
    }

    let template_bytes = template.load(&crawler).await?;
    let articles = scrape_articles(&crawler, &urls).await;
    if articles.is_empty() {
        return Err(DigestError::ParseError("none of the articles could be scraped".to_string()));
    }

    let docx = render_docx(&template_bytes, &articles)?;
    tokio::fs::create_dir_all(output_dir).await?;
    let titles = articles.iter().map(|a| a.title.clone()).collect();

    if !with_pdf {
        let docx_path = output_dir.join("digest.docx");
        tokio::fs::write(&docx_path, &docx).await?;
        return Ok(RenderedDigest {
            docx_path,
            pdf_path: None,
            titles,
        });
    }

    let converter = PdfConverter::locate()?;
    let date = chrono::Local::now().date_naive();
    let (docx_path, pdf_path) = write_pdf(&converter, &docx, output_dir, date).await?;
    Ok(RenderedDigest {
        docx_path,
        pdf_path: Some(pdf_path),
        titles,
    })
}

async fn forget_urls(ledger: &dyn SeenUrlLedger, urls: &[String]) {
    for url in urls {
        if let Err(e) = ledger.remove(url).await {
            warn!("Could not remove {} from the ledger: {}", url, e);
        }
    }
}

async fn keep_copies(dir: &Path, files: &[&Path]) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    for file in files {
        if let Some(name) = file.file_name() {
            tokio::fs::copy(file, dir.join(name)).await?;
        }
    }
    info!("Kept generated files in {}", dir.display());
    Ok(())
}
