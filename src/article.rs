//! Article data structures and content extraction
//!
//! An article page is reduced to an ordered list of [`ContentBlock`]s that
//! map one-to-one onto paragraphs of the rendered digest.

use crate::error::{DigestError, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Container holding the article body on the source site
const MAIN_CONTENT_SELECTOR: &str = "div.inside_post.column.content_width";

/// Article title element inside the main content container
const TITLE_SELECTOR: &str = "h1#list";

/// Exact class lists of direct children that are page chrome, not content
const SKIPPED_CLASS_LISTS: &[&[&str]] = &[
    &[
        "sharethis-inline-share-buttons",
        "st-center",
        "st-has-labels",
        "st-inline-share-buttons",
        "st-animated",
    ],
    &["prenext"],
];

/// Bullet prefix added to list items
pub const BULLET_PREFIX: &str = "• ";

/// A single unit of article content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Article title (level 1 heading)
    Heading(String),
    /// Body paragraph
    Paragraph(String),
    /// Level 2 heading
    #[serde(rename = "heading_2")]
    Heading2(String),
    /// Level 4 heading
    #[serde(rename = "heading_4")]
    Heading4(String),
    /// Bullet list entry, already prefixed with [`BULLET_PREFIX`]
    ListItem(String),
}

impl ContentBlock {
    pub fn text(&self) -> &str {
        match self {
            ContentBlock::Heading(t)
            | ContentBlock::Paragraph(t)
            | ContentBlock::Heading2(t)
            | ContentBlock::Heading4(t)
            | ContentBlock::ListItem(t) => t,
        }
    }

    /// Short label used in CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Heading(_) => "heading",
            ContentBlock::Paragraph(_) => "paragraph",
            ContentBlock::Heading2(_) => "heading_2",
            ContentBlock::Heading4(_) => "heading_4",
            ContentBlock::ListItem(_) => "list_item",
        }
    }
}

/// A scraped article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    /// Content blocks in page order; the first block is always the title heading
    pub blocks: Vec<ContentBlock>,
}

/// Parse an article page into content blocks
pub fn parse_article(url: &str, html: &str) -> Result<Article> {
    let document = Html::parse_document(html);

    let main_selector = Selector::parse(MAIN_CONTENT_SELECTOR).expect("valid selector");
    let title_selector = Selector::parse(TITLE_SELECTOR).expect("valid selector");
    let li_selector = Selector::parse("li").expect("valid selector");

    let main = document
        .select(&main_selector)
        .next()
        .ok_or_else(|| DigestError::ParseError(format!("main content div not found in {}", url)))?;

    let title = main
        .select(&title_selector)
        .next()
        .map(element_text)
        .ok_or_else(|| DigestError::ParseError(format!("heading not found in {}", url)))?;

    let mut blocks = vec![ContentBlock::Heading(title.clone())];

    for child in main.children().filter_map(ElementRef::wrap) {
        if is_skipped(&child) {
            continue;
        }

        match child.value().name() {
            "p" => push_text(&mut blocks, element_text(child), ContentBlock::Paragraph),
            "h2" => push_text(&mut blocks, element_text(child), ContentBlock::Heading2),
            "h4" => push_text(&mut blocks, element_text(child), ContentBlock::Heading4),
            "ul" => {
                for li in child.select(&li_selector) {
                    let text = element_text(li);
                    if !text.is_empty() {
                        blocks.push(ContentBlock::ListItem(format!("{}{}", BULLET_PREFIX, text)));
                    }
                }
            }
            _ => {}
        }
    }

    debug!("Parsed {} content blocks from {}", blocks.len(), url);

    Ok(Article {
        url: url.to_string(),
        title,
        blocks,
    })
}

fn push_text(blocks: &mut Vec<ContentBlock>, text: String, make: fn(String) -> ContentBlock) {
    if !text.is_empty() {
        blocks.push(make(text));
    }
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn is_skipped(element: &ElementRef) -> bool {
    let classes: Vec<&str> = element
        .value()
        .attr("class")
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default();

    SKIPPED_CLASS_LISTS
        .iter()
        .any(|skipped| classes.as_slice() == *skipped)
}
