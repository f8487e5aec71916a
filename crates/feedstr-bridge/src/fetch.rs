//! Feed fetching and parsing.
//!
//! Fetches a registered URL under a fixed per-call timeout and converts the
//! parsed feed into the transient shapes the content pipeline consumes.
//!
//! The parser normalizes entry dates and drops the original text, so for
//! entries where it produced no structured timestamp the fetcher recovers
//! the raw date strings from the matching `<item>`/`<entry>` block of the
//! response body. The resolution ladder in `feedstr-core` then gets a chance
//! to apply the configured format list before the item is skipped.

use std::sync::LazyLock;
use std::time::Duration;

use feed_rs::model::{Entry, Feed};
use regex::Regex;

use feedstr_core::{FeedInfo, FeedItem};

use crate::error::Result;

static ENTRY_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<item[\s>].*?</item\s*>|<entry[\s>].*?</entry\s*>")
        .expect("entry block regex should compile")
});

static PUBLISHED_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:pubdate|dc:date|published)[^>]*>\s*(.*?)\s*</(?:pubdate|dc:date|published)\s*>")
        .expect("published text regex should compile")
});

static UPDATED_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:updated|modified)[^>]*>\s*(.*?)\s*</(?:updated|modified)\s*>")
        .expect("updated text regex should compile")
});

/// A fetched and parsed feed.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub info: FeedInfo,
    pub items: Vec<FeedItem>,
}

/// HTTP client wrapper for feed fetching.
pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    /// Build a fetcher with the given per-call timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedstr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Borrow the underlying HTTP client (shared with favicon discovery).
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch and parse one feed URL.
    pub async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let feed = feed_rs::parser::parse(body.as_ref())?;
        Ok(convert(feed, &body))
    }
}

/// Convert a parsed feed into pipeline shapes, recovering raw date text for
/// entries the parser left dateless.
fn convert(feed: Feed, raw_body: &[u8]) -> FetchedFeed {
    let info = FeedInfo {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        description: feed.description.map(|t| t.content).unwrap_or_default(),
        link: feed
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default(),
        image: feed
            .logo
            .map(|i| i.uri)
            .or_else(|| feed.icon.map(|i| i.uri)),
    };

    let needs_recovery = feed
        .entries
        .iter()
        .any(|e| e.published.is_none() && e.updated.is_none());
    let raw_text = if needs_recovery {
        Some(String::from_utf8_lossy(raw_body).into_owned())
    } else {
        None
    };

    let items = feed
        .entries
        .into_iter()
        .map(|entry| convert_entry(entry, raw_text.as_deref()))
        .collect();

    FetchedFeed { info, items }
}

fn convert_entry(entry: Entry, raw_text: Option<&str>) -> FeedItem {
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();

    let body = entry
        .summary
        .map(|t| t.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    let categories = entry
        .categories
        .into_iter()
        .map(|c| c.label.unwrap_or(c.term))
        .collect();

    let enclosures = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|c| c.url.as_ref().map(|u| u.to_string()))
        .collect();

    let (published_raw, updated_raw) = if entry.published.is_none() && entry.updated.is_none() {
        match raw_text {
            Some(raw) => {
                let needle = if !link.is_empty() { &link } else { &entry.id };
                extract_raw_dates(raw, needle)
            }
            None => (None, None),
        }
    } else {
        (None, None)
    };

    FeedItem {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        body,
        link,
        published: entry.published,
        updated: entry.updated,
        published_raw,
        updated_raw,
        categories,
        enclosures,
    }
}

/// Pull raw published/updated text out of the entry block containing
/// `needle` (the entry's link or id). Returns nothing when the block can't
/// be located; the item then falls through to the non-fatal skip.
fn extract_raw_dates(raw: &str, needle: &str) -> (Option<String>, Option<String>) {
    if needle.is_empty() {
        return (None, None);
    }

    for block in ENTRY_BLOCK_RE.find_iter(raw) {
        let block = block.as_str();
        if !block.contains(needle) {
            continue;
        }

        let published = PUBLISHED_TEXT_RE
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty());
        let updated = UPDATED_TEXT_RE
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty());

        return (published, updated);
    }

    (None, None)
}
