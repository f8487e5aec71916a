//! Transient feed shapes consumed by the content pipeline.
//!
//! These are produced by parsing one fetch response and discarded after the
//! pipeline has run; nothing here is persisted.

use chrono::{DateTime, Utc};

/// Feed-level metadata used for the profile message and display.
#[derive(Debug, Clone, Default)]
pub struct FeedInfo {
    /// Feed title.
    pub title: String,
    /// Feed description.
    pub description: String,
    /// Canonical link to the feed's site.
    pub link: String,
    /// Declared image URL, if the feed has one. When absent the favicon
    /// fallback policy fills this in before the profile is published.
    pub image: Option<String>,
}

/// One entry from a fetched feed.
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    /// Item title.
    pub title: String,
    /// Raw description/body HTML.
    pub body: String,
    /// Canonical link to the item.
    pub link: String,
    /// Structured publish time, when the parser produced one.
    pub published: Option<DateTime<Utc>>,
    /// Structured update time, when the parser produced one.
    pub updated: Option<DateTime<Utc>>,
    /// Raw publish-time text, recovered from the response when the parser
    /// produced no structured time.
    pub published_raw: Option<String>,
    /// Raw update-time text, same recovery path as `published_raw`.
    pub updated_raw: Option<String>,
    /// Category strings attached to the item.
    pub categories: Vec<String>,
    /// Enclosure URLs (media attachments).
    pub enclosures: Vec<String>,
}
