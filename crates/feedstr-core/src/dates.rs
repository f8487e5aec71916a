//! Timestamp resolution for feed items.
//!
//! Feeds in the wild disagree wildly about date formats. Resolution tries,
//! in order: the parser's structured publish time, the structured update
//! time, the raw publish text, the raw update text. The raw texts are
//! matched against an ordered, configurable list of format strings after the
//! standard RFC 2822 / RFC 3339 parsers have had their turn. The first
//! success wins; exhausting every option is a non-fatal skip for the item.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::item::FeedItem;

/// Ordered list of date format strings tried against raw date text.
#[derive(Debug, Clone)]
pub struct DateFormats {
    formats: Vec<String>,
}

impl Default for DateFormats {
    fn default() -> Self {
        Self {
            formats: [
                // ISO 8601 variants feed-rs occasionally leaves unparsed
                "%Y-%m-%dT%H:%M:%S%.f%:z",
                "%Y-%m-%dT%H:%M:%S%z",
                // Plain datetimes, assumed UTC
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%dT%H:%M:%S",
                // Date only
                "%Y-%m-%d",
                // RSS with a single-digit day and numeric zone
                "%a, %e %b %Y %H:%M:%S %z",
                "%e %b %Y %H:%M:%S %z",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl DateFormats {
    /// Build from an explicit, ordered format list (configuration override).
    pub fn new(formats: Vec<String>) -> Self {
        if formats.is_empty() {
            return Self::default();
        }
        Self { formats }
    }

    /// Parse raw date text.
    ///
    /// RFC 2822 (the RSS `pubDate` family, including named zones) and
    /// RFC 3339 are always tried first; the configured format list follows,
    /// first with an explicit offset, then as a naive datetime assumed UTC,
    /// then as a bare date at midnight UTC.
    pub fn parse_text(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }

        for format in &self.formats {
            if let Ok(dt) = DateTime::parse_from_str(text, format) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Some(naive.and_utc());
            }
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                    return Some(naive.and_utc());
                }
            }
        }

        None
    }

    /// Resolve an item's timestamp.
    ///
    /// Preference order: structured published, structured updated, raw
    /// published text, raw updated text. `None` means the item carries no
    /// resolvable time and should be skipped with a warning.
    pub fn resolve(&self, item: &FeedItem) -> Option<DateTime<Utc>> {
        if let Some(published) = item.published {
            return Some(published);
        }
        if let Some(updated) = item.updated {
            tracing::debug!(title = %item.title, "using structured update time");
            return Some(updated);
        }
        if let Some(raw) = item.published_raw.as_deref() {
            if let Some(parsed) = self.parse_text(raw) {
                tracing::debug!(title = %item.title, raw = %raw, "parsed raw publish time");
                return Some(parsed);
            }
            tracing::warn!(title = %item.title, raw = %raw, "unparseable raw publish time");
        }
        if let Some(raw) = item.updated_raw.as_deref() {
            if let Some(parsed) = self.parse_text(raw) {
                tracing::debug!(title = %item.title, raw = %raw, "parsed raw update time");
                return Some(parsed);
            }
            tracing::warn!(title = %item.title, raw = %raw, "unparseable raw update time");
        }
        None
    }
}
