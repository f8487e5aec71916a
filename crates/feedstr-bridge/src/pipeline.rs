//! Per-item publishing pipeline.
//!
//! Glues the pure content pipeline to the publisher: resolve the item's
//! timestamp, apply the age window, build and sign the note, hand it to the
//! publisher. An item without a resolvable timestamp is dropped with a
//! warning; an item older than the window is dropped silently. Neither
//! aborts the remaining items.

use chrono::{DateTime, Utc};

use feedstr_core::{note, DateFormats, FeedIdentity, FeedItem};

use crate::publisher::Publisher;

/// Admission decision for one item against the age window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Publish with this resolved timestamp.
    Publish(DateTime<Utc>),
    /// Resolved, but older than the window.
    TooOld,
    /// No resolvable timestamp.
    Undated,
}

/// Counters for one feed's worth of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemStats {
    pub published: usize,
    pub skipped_old: usize,
    pub skipped_undated: usize,
    pub errors: usize,
}

/// Item-to-note pipeline with the configured date formats.
pub struct ContentPipeline {
    formats: DateFormats,
}

impl ContentPipeline {
    pub fn new(formats: DateFormats) -> Self {
        Self { formats }
    }

    /// Decide whether an item is publishable at `now` with the given
    /// maximum-age window. The boundary is inclusive: an item exactly
    /// `window` old is still admitted. Future-dated items are not excluded.
    pub fn admit(
        &self,
        item: &FeedItem,
        window: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Admission {
        let Some(resolved) = self.formats.resolve(item) else {
            return Admission::Undated;
        };

        let cutoff = now.timestamp() - window.as_secs() as i64;
        if resolved.timestamp() >= cutoff {
            Admission::Publish(resolved)
        } else {
            Admission::TooOld
        }
    }

    /// Run every item of one feed through the pipeline and publish the
    /// admitted ones.
    pub async fn publish_items(
        &self,
        publisher: &Publisher,
        identity: &FeedIdentity,
        feed_url: &str,
        items: &[FeedItem],
        window: std::time::Duration,
    ) -> ItemStats {
        let now = Utc::now();
        let mut stats = ItemStats::default();

        for item in items {
            match self.admit(item, window, now) {
                Admission::Undated => {
                    tracing::warn!(
                        url = %feed_url,
                        title = %item.title,
                        "no resolvable timestamp, skipping item"
                    );
                    stats.skipped_undated += 1;
                    continue;
                }
                Admission::TooOld => {
                    stats.skipped_old += 1;
                    continue;
                }
                Admission::Publish(resolved) => {
                    match note::build_note(identity, feed_url, item, resolved) {
                        Ok(event) => {
                            let summary = publisher.publish(&event).await;
                            if !summary.dry_run && summary.delivered() == 0 {
                                tracing::warn!(
                                    url = %feed_url,
                                    title = %item.title,
                                    "event reached no destination"
                                );
                            }
                            metrics::counter!("items_published_total").increment(1);
                            stats.published += 1;
                        }
                        Err(e) => {
                            tracing::warn!(
                                url = %feed_url,
                                title = %item.title,
                                error = %e,
                                "failed to build note"
                            );
                            stats.errors += 1;
                        }
                    }
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::RelayTransport;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use nostr::Event;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingTransport {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl RelayTransport for CountingTransport {
        async fn deliver(&self, _destination: &str, _event: &Event) -> Result<(), String> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dated_item(title: &str, published: DateTime<Utc>) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            body: "body".to_string(),
            link: format!("https://example.com/{title}"),
            published: Some(published),
            ..Default::default()
        }
    }

    #[test]
    fn test_admit_boundary_is_inclusive() {
        let pipeline = ContentPipeline::new(DateFormats::default());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let window = Duration::from_secs(3600);

        let at_boundary = dated_item("boundary", now - chrono::Duration::seconds(3600));
        assert_eq!(
            pipeline.admit(&at_boundary, window, now),
            Admission::Publish(now - chrono::Duration::seconds(3600))
        );

        let too_old = dated_item("old", now - chrono::Duration::seconds(3601));
        assert_eq!(pipeline.admit(&too_old, window, now), Admission::TooOld);
    }

    #[test]
    fn test_admit_future_dated_passes() {
        let pipeline = ContentPipeline::new(DateFormats::default());
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let future = dated_item("future", now + chrono::Duration::seconds(600));
        assert!(matches!(
            pipeline.admit(&future, Duration::from_secs(3600), now),
            Admission::Publish(_)
        ));
    }

    #[test]
    fn test_admit_undated() {
        let pipeline = ContentPipeline::new(DateFormats::default());
        let now = Utc::now();
        let item = FeedItem {
            title: "undated".to_string(),
            ..Default::default()
        };
        assert_eq!(
            pipeline.admit(&item, Duration::from_secs(3600), now),
            Admission::Undated
        );
    }

    #[tokio::test]
    async fn test_publish_items_mixed_batch() {
        let transport = Arc::new(CountingTransport {
            delivered: AtomicUsize::new(0),
        });
        let publisher = Publisher::new(
            vec!["wss://one.example".to_string()],
            Duration::from_secs(1),
            false,
            transport.clone(),
        );
        let pipeline = ContentPipeline::new(DateFormats::default());
        let identity = FeedIdentity::generate();

        let items = vec![
            dated_item("fresh", Utc::now()),
            dated_item("ancient", Utc::now() - chrono::Duration::days(365)),
            FeedItem {
                title: "undated".to_string(),
                ..Default::default()
            },
        ];

        let stats = pipeline
            .publish_items(
                &publisher,
                &identity,
                "https://example.com/feed",
                &items,
                Duration::from_secs(3600),
            )
            .await;

        assert_eq!(stats.published, 1);
        assert_eq!(stats.skipped_old, 1);
        assert_eq!(stats.skipped_undated, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(transport.delivered.load(Ordering::SeqCst), 1);
    }
}
