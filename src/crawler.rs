//! Web crawler module for fetching listing pages, articles and templates

use crate::article::{parse_article, Article};
use crate::error::{DigestError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

/// Default listing page of the current-affairs section
pub const DEFAULT_BASE_URL: &str = "https://www.gktoday.in/current-affairs/";

/// Default number of listing pages to walk
pub const DEFAULT_PAGES: u32 = 3;

/// Configuration for the web crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Connection timeout (default: 10 seconds)
    pub connect_timeout: Duration,
    /// Request timeout (default: 30 seconds)
    pub request_timeout: Duration,
    /// Maximum number of retry attempts (default: 3)
    pub max_retries: u32,
    /// Initial delay between retries (default: 1 second, doubles each retry)
    pub retry_base_delay: Duration,
    /// Maximum delay between retries (default: 10 seconds)
    pub retry_max_delay: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(10),
        }
    }
}

impl CrawlerConfig {
    /// Delay before the given retry attempt (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        std::cmp::min(
            self.retry_base_delay * 2u32.saturating_pow(attempt.saturating_sub(1)),
            self.retry_max_delay,
        )
    }
}

/// Web crawler for the current-affairs site
pub struct Crawler {
    client: Client,
    config: CrawlerConfig,
}

impl Crawler {
    /// Create a new crawler instance with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new crawler instance with custom configuration
    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DigestError::FetchError {
                url: "client_init".to_string(),
                source: e,
            })?;

        Ok(Self { client, config })
    }

    /// Fetch a URL and return the body as text, with retry support
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetch a URL and return the raw body, with retry support
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        info!("Fetching URL: {}", url);

        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.backoff_delay(attempt);
                warn!(
                    "Retry attempt {}/{} for {} after {:?}",
                    attempt, self.config.max_retries, url, delay
                );
                sleep(delay).await;
            }

            match self.fetch_once(url).await {
                Ok(body) => {
                    if attempt > 0 {
                        info!("Successfully fetched {} on attempt {}", url, attempt + 1);
                    }
                    return Ok(body);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "Fetch attempt {} failed for {}: {}",
                        attempt + 1,
                        url,
                        last_error
                    );

                    // Don't retry on client errors (4xx) except 429 (rate limit)
                    if let DigestError::HttpStatusError { status, .. } = &e {
                        if (400..500).contains(status) && *status != 429 {
                            return Err(e);
                        }
                    }
                }
            }
        }

        Err(DigestError::RetryExhausted {
            url: url.to_string(),
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }

    /// Single fetch attempt without retry
    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DigestError::FetchError {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DigestError::FetchError {
                url: url.to_string(),
                source: e,
            })?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }

    /// Collect article URLs from the first `pages` listing pages
    ///
    /// A failing page is logged and skipped; whatever was collected is returned.
    pub async fn fetch_article_urls(&self, base_url: &str, pages: u32) -> Vec<String> {
        info!("Fetching article URLs from {} for {} pages", base_url, pages);

        let mut article_urls: Vec<String> = Vec::new();

        for page in 1..=pages {
            let page_url = listing_page_url(base_url, page);
            let html = match self.fetch(&page_url).await {
                Ok(html) => html,
                Err(e) => {
                    error!("Error while fetching listing page {}: {}", page_url, e);
                    continue;
                }
            };

            match parse_article_links(&page_url, &html) {
                Ok(links) => {
                    debug!("Found {} article links on {}", links.len(), page_url);
                    for link in links {
                        if !article_urls.contains(&link) {
                            article_urls.push(link);
                        }
                    }
                }
                Err(e) => error!("Error while parsing listing page {}: {}", page_url, e),
            }
        }

        info!("Collected {} article URLs", article_urls.len());
        article_urls
    }

    /// Fetch and parse a single article
    pub async fn fetch_article(&self, url: &str) -> Result<Article> {
        info!("Scraping content from {}", url);
        let html = self.fetch(url).await?;
        parse_article(url, &html)
    }

    /// Fetch and parse a single article, logging and swallowing failures
    pub async fn scrape_article(&self, url: &str) -> Option<Article> {
        match self.fetch_article(url).await {
            Ok(article) => Some(article),
            Err(e) => {
                error!("Error while scraping content from {}: {}", url, e);
                None
            }
        }
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new().expect("Failed to create crawler")
    }
}

/// URL of the given (1-based) listing page
pub fn listing_page_url(base_url: &str, page: u32) -> String {
    if page <= 1 {
        base_url.to_string()
    } else {
        format!("{}page/{}/", base_url, page)
    }
}

/// Extract article links from a listing page
///
/// Takes the first `href`-bearing anchor inside each `h1#list`. Absolute
/// hrefs are kept verbatim so they match ledger entries byte for byte;
/// relative ones are resolved against `page_url`.
pub fn parse_article_links(page_url: &str, html: &str) -> Result<Vec<String>> {
    let base = Url::parse(page_url).map_err(|_| DigestError::InvalidUrl(page_url.to_string()))?;
    let document = Html::parse_document(html);
    let heading_selector = Selector::parse("h1#list").expect("valid selector");
    let anchor_selector = Selector::parse("a").expect("valid selector");

    let links = document
        .select(&heading_selector)
        .filter_map(|h1| h1.select(&anchor_selector).next())
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| {
            if Url::parse(href).is_ok() {
                return href.to_string();
            }
            base.join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string())
        })
        .collect();

    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockServer;

    #[test]
    fn listing_page_url_formats_pages() {
        let base = "https://www.gktoday.in/current-affairs/";
        assert_eq!(listing_page_url(base, 1), base);
        assert_eq!(
            listing_page_url(base, 2),
            "https://www.gktoday.in/current-affairs/page/2/"
        );
        assert_eq!(
            listing_page_url(base, 3),
            "https://www.gktoday.in/current-affairs/page/3/"
        );
    }

    #[test]
    fn parse_article_links_takes_first_anchor_of_each_list_heading() {
        let html = r#"
            <html><body>
              <h1 id="list"><a href="https://www.gktoday.in/a-one/">One</a><a href="/ignored/">x</a></h1>
              <h1 class="other"><a href="https://www.gktoday.in/not-listed/">No</a></h1>
              <h1 id="list"><span>no link</span></h1>
              <h1 id="list"><a href="/relative-two/">Two</a></h1>
              <h1 id="list"><a>no href</a></h1>
            </body></html>
        "#;
        let links =
            parse_article_links("https://www.gktoday.in/current-affairs/", html).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.gktoday.in/a-one/".to_string(),
                "https://www.gktoday.in/relative-two/".to_string(),
            ]
        );
    }

    #[test]
    fn absolute_links_are_kept_verbatim() {
        let html = r#"
            <h1 id="list"><a href="https://www.gktoday.in/café-news/">Café</a></h1>
            <h1 id="list"><a href="https://www.gktoday.in/a/../b/">Dots</a></h1>
            <h1 id="list"><a href="https://WWW.gktoday.in/Upper/">Host</a></h1>
        "#;
        let links =
            parse_article_links("https://www.gktoday.in/current-affairs/", html).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.gktoday.in/café-news/".to_string(),
                "https://www.gktoday.in/a/../b/".to_string(),
                "https://WWW.gktoday.in/Upper/".to_string(),
            ]
        );
    }

    #[test]
    fn parse_article_links_rejects_invalid_page_url() {
        let err = parse_article_links("not a url", "<html></html>").unwrap_err();
        assert!(matches!(err, DigestError::InvalidUrl(_)));
    }

    #[test]
    fn crawler_config_default_values() {
        let config = CrawlerConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.retry_max_delay, Duration::from_secs(10));
    }

    #[test]
    fn crawler_with_custom_config() {
        let config = CrawlerConfig {
            max_retries: 5,
            retry_base_delay: Duration::from_millis(500),
            ..Default::default()
        };
        let crawler = Crawler::with_config(config).unwrap();
        assert_eq!(crawler.config.max_retries, 5);
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let config = CrawlerConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(4), Duration::from_secs(8));
        // 16s, capped at 10s
        assert_eq!(config.backoff_delay(5), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn unreachable_listing_pages_yield_empty_result() {
        let crawler = Crawler::with_config(CrawlerConfig {
            max_retries: 0,
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap();

        let urls = crawler.fetch_article_urls("http://127.0.0.1:1/", 2).await;
        assert!(urls.is_empty());
    }

    fn fast_crawler() -> Crawler {
        Crawler::with_config(CrawlerConfig {
            max_retries: 1,
            retry_base_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(20),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn listing(paths: &[&str]) -> String {
        paths
            .iter()
            .map(|p| format!(r#"<h1 id="list"><a href="{}">x</a></h1>"#, p))
            .collect()
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start(&[("/gone/", 404, "")]).await;
        let crawler = fast_crawler();

        let err = crawler.fetch(&server.url("/gone/")).await.unwrap_err();

        assert!(matches!(err, DigestError::HttpStatusError { status: 404, .. }));
        assert_eq!(server.hits("/gone/"), 1);
    }

    #[tokio::test]
    async fn server_errors_and_rate_limits_are_retried() {
        let server = MockServer::start(&[("/busy/", 503, ""), ("/slow-down/", 429, "")]).await;
        let crawler = fast_crawler();

        let err = crawler.fetch(&server.url("/busy/")).await.unwrap_err();
        assert!(matches!(err, DigestError::RetryExhausted { attempts: 2, .. }));
        assert_eq!(server.hits("/busy/"), 2);

        let err = crawler.fetch(&server.url("/slow-down/")).await.unwrap_err();
        assert!(matches!(err, DigestError::RetryExhausted { attempts: 2, .. }));
        assert_eq!(server.hits("/slow-down/"), 2);
    }

    #[tokio::test]
    async fn links_repeated_across_pages_are_returned_once() {
        let page1 = listing(&["/a/", "/b/"]);
        let page2 = listing(&["/b/", "/c/"]);
        let server = MockServer::start(&[
            ("/list/", 200, page1.as_str()),
            ("/list/page/2/", 200, page2.as_str()),
        ])
        .await;

        let urls = fast_crawler()
            .fetch_article_urls(&server.url("/list/"), 2)
            .await;

        assert_eq!(
            urls,
            vec![server.url("/a/"), server.url("/b/"), server.url("/c/")]
        );
    }

    #[tokio::test]
    async fn failing_middle_page_is_skipped() {
        let page1 = listing(&["/a/"]);
        let page3 = listing(&["/c/"]);
        let server = MockServer::start(&[
            ("/list/", 200, page1.as_str()),
            ("/list/page/3/", 200, page3.as_str()),
        ])
        .await;

        let urls = fast_crawler()
            .fetch_article_urls(&server.url("/list/"), 3)
            .await;

        assert_eq!(urls, vec![server.url("/a/"), server.url("/c/")]);
        assert_eq!(server.hits("/list/page/2/"), 1);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn fetches_live_listing() {
        let crawler = Crawler::new().unwrap();
        let urls = crawler.fetch_article_urls(DEFAULT_BASE_URL, 1).await;
        assert!(!urls.is_empty());
    }
}
