//! Single-feed registration pipeline.
//!
//! The same steps back both the CLI `add` command and the async add jobs:
//! validate the URL parses as a feed, reject duplicates, generate an
//! identity, persist the record, announce the profile, and replay the feed's
//! existing items through the content pipeline with the history window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use feedstr_core::{note, FeedIdentity, FeedInfo};

use crate::error::{Error, Result};
use crate::favicon;
use crate::fetch::{FeedFetcher, FetchedFeed};
use crate::health::FeedHealth;
use crate::pipeline::{ContentPipeline, ItemStats};
use crate::publisher::Publisher;
use crate::store::{FeedRecord, FeedStore};

/// Feed registration service.
pub struct Registrar {
    store: Arc<FeedStore>,
    fetcher: Arc<FeedFetcher>,
    publisher: Arc<Publisher>,
    pipeline: Arc<ContentPipeline>,
    nip05_domain: String,
    default_feed_image: String,
    history_window: Duration,
}

impl Registrar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<FeedStore>,
        fetcher: Arc<FeedFetcher>,
        publisher: Arc<Publisher>,
        pipeline: Arc<ContentPipeline>,
        nip05_domain: String,
        default_feed_image: String,
        history_window: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            publisher,
            pipeline,
            nip05_domain,
            default_feed_image,
            history_window,
        }
    }

    /// Whether the publisher is in dry-run mode.
    pub fn dry_run(&self) -> bool {
        self.publisher.dry_run()
    }

    /// Validate that the URL serves a parseable feed.
    pub async fn validate(&self, url: &str) -> Result<FetchedFeed> {
        self.fetcher
            .fetch(url)
            .await
            .map_err(|e| Error::Validation(format!("no valid feed found at {url}: {e}")))
    }

    /// Look up an existing registration.
    pub fn lookup(&self, url: &str) -> Result<Option<FeedRecord>> {
        self.store.get(url)
    }

    /// Persist a newly registered feed with a fresh identity.
    ///
    /// The store's URL uniqueness guarantees a feed can never acquire a
    /// second identity, even when two registrations race.
    pub fn register(&self, url: &str, identity: &FeedIdentity) -> Result<FeedRecord> {
        let record = FeedRecord {
            url: url.to_string(),
            public_key: identity.public_key_hex(),
            secret_key: identity.secret_key_hex(),
            health: FeedHealth {
                last_success: Some(Utc::now().timestamp()),
                ..Default::default()
            },
        };
        self.store.insert(&record)?;
        tracing::info!(url = %url, pubkey = %record.public_key, "feed registered");
        Ok(record)
    }

    /// Fill in the feed image via favicon discovery when none is declared.
    pub async fn resolve_image(&self, url: &str, info: &mut FeedInfo) {
        if info.image.is_none() {
            let icon = favicon::discover(
                self.fetcher.http_client(),
                url,
                &self.default_feed_image,
            )
            .await;
            if icon == self.default_feed_image {
                tracing::debug!(url = %url, "no favicon found, using default image");
            } else {
                tracing::debug!(url = %url, icon = %icon, "using discovered favicon");
            }
            info.image = Some(icon);
        }
    }

    /// Build and publish the feed's profile-metadata message.
    pub async fn announce(
        &self,
        identity: &FeedIdentity,
        url: &str,
        info: &FeedInfo,
    ) -> Result<()> {
        let event = note::build_profile(identity, url, info, &self.nip05_domain)?;
        tracing::debug!(url = %url, title = %info.title, "publishing feed profile");
        self.publisher.publish(&event).await;
        Ok(())
    }

    /// Replay the feed's current items with the history-backfill window.
    pub async fn backfill(
        &self,
        identity: &FeedIdentity,
        url: &str,
        feed: &FetchedFeed,
    ) -> ItemStats {
        tracing::info!(url = %url, items = feed.items.len(), "replaying feed history");
        let stats = self
            .pipeline
            .publish_items(
                &self.publisher,
                identity,
                url,
                &feed.items,
                self.history_window,
            )
            .await;
        tracing::info!(
            url = %url,
            published = stats.published,
            skipped = stats.skipped_old + stats.skipped_undated,
            "finished replaying feed history"
        );
        stats
    }

    /// Refresh and re-publish one feed's profile (metadata batch path).
    pub async fn refresh_profile(&self, record: &FeedRecord) -> Result<()> {
        let fetched = self.validate(&record.url).await?;
        let mut info = fetched.info;
        self.resolve_image(&record.url, &mut info).await;

        let identity = FeedIdentity::from_secret_hex(&record.secret_key)?;
        self.announce(&identity, &record.url, &info).await
    }

    /// The full add pipeline, used by the CLI.
    pub async fn add_feed(&self, url: &str) -> Result<(FeedRecord, String)> {
        let fetched = self.validate(url).await?;

        if self.lookup(url)?.is_some() {
            return Err(Error::Duplicate(url.to_string()));
        }

        let identity = FeedIdentity::generate();
        let record = self.register(url, &identity)?;

        let mut info = fetched.info.clone();
        self.resolve_image(url, &mut info).await;
        self.announce(&identity, url, &info).await?;

        self.backfill(&identity, url, &fetched).await;

        let npub = identity.npub()?;
        Ok((record, npub))
    }

    /// Remove a registration.
    pub fn remove_feed(&self, url: &str) -> Result<()> {
        self.store.delete(url)?;
        tracing::info!(url = %url, "feed removed");
        Ok(())
    }

    /// All registrations, for listing.
    pub fn list_feeds(&self) -> Result<Vec<FeedRecord>> {
        self.store.all_feeds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::RelayTransport;
    use async_trait::async_trait;
    use feedstr_core::DateFormats;
    use nostr::Event;
    use parking_lot::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Transport capturing every delivered event.
    struct CapturingTransport {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl RelayTransport for CapturingTransport {
        async fn deliver(
            &self,
            _destination: &str,
            event: &Event,
        ) -> std::result::Result<(), String> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    fn rss_with_fresh_item() -> String {
        let now = Utc::now().to_rfc2822();
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <description>Posts</description>
    <link>https://example.com</link>
    <image><url>https://example.com/logo.png</url><title>t</title><link>https://example.com</link></image>
    <item>
      <title>Fresh</title>
      <description>New post</description>
      <link>https://example.com/fresh</link>
      <pubDate>{now}</pubDate>
    </item>
    <item>
      <title>Stale</title>
      <description>Old post</description>
      <link>https://example.com/stale</link>
      <pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate>
    </item>
  </channel>
</rss>"#
        )
    }

    fn registrar_with(
        server_store: Arc<FeedStore>,
        transport: Arc<CapturingTransport>,
    ) -> Registrar {
        let fetcher = Arc::new(FeedFetcher::new(Duration::from_secs(5)).unwrap());
        let publisher = Arc::new(Publisher::new(
            vec!["wss://relay.example".to_string()],
            Duration::from_secs(1),
            false,
            transport,
        ));
        let pipeline = Arc::new(ContentPipeline::new(DateFormats::default()));
        Registrar::new(
            server_store,
            fetcher,
            publisher,
            pipeline,
            "bridge.example".to_string(),
            "https://img.example/default.png".to_string(),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_add_feed_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(rss_with_fresh_item(), "application/rss+xml"),
            )
            .mount(&server)
            .await;

        let store = Arc::new(FeedStore::open_in_memory().unwrap());
        let transport = Arc::new(CapturingTransport {
            events: Mutex::new(Vec::new()),
        });
        let registrar = registrar_with(store.clone(), transport.clone());

        let url = format!("{}/feed", server.uri());
        let (record, npub) = registrar.add_feed(&url).await.unwrap();

        assert_eq!(record.url, url);
        assert!(npub.starts_with("npub1"));
        assert!(store.get(&url).unwrap().is_some());

        // One profile event (kind 0) and one fresh note (kind 1); the stale
        // item is outside the history window.
        let events = transport.events.lock();
        let kinds: Vec<u16> = events.iter().map(|e| e.kind.as_u16()).collect();
        assert!(kinds.contains(&0));
        assert_eq!(kinds.iter().filter(|k| **k == 1).count(), 1);
    }

    #[tokio::test]
    async fn test_add_feed_duplicate_rejected_with_same_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(rss_with_fresh_item(), "application/rss+xml"),
            )
            .mount(&server)
            .await;

        let store = Arc::new(FeedStore::open_in_memory().unwrap());
        let transport = Arc::new(CapturingTransport {
            events: Mutex::new(Vec::new()),
        });
        let registrar = registrar_with(store.clone(), transport);

        let url = format!("{}/feed", server.uri());
        let (first, _) = registrar.add_feed(&url).await.unwrap();

        let err = registrar.add_feed(&url).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));

        // The identity is unchanged by the rejected attempt.
        let stored = store.get(&url).unwrap().unwrap();
        assert_eq!(stored.public_key, first.public_key);
    }

    #[tokio::test]
    async fn test_add_feed_invalid_url_is_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nope"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
            .mount(&server)
            .await;

        let store = Arc::new(FeedStore::open_in_memory().unwrap());
        let transport = Arc::new(CapturingTransport {
            events: Mutex::new(Vec::new()),
        });
        let registrar = registrar_with(store.clone(), transport);

        let url = format!("{}/nope", server.uri());
        let err = registrar.add_feed(&url).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.get(&url).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_feed() {
        let store = Arc::new(FeedStore::open_in_memory().unwrap());
        let transport = Arc::new(CapturingTransport {
            events: Mutex::new(Vec::new()),
        });
        let registrar = registrar_with(store.clone(), transport);

        let identity = FeedIdentity::generate();
        registrar.register("https://a.example/feed", &identity).unwrap();

        registrar.remove_feed("https://a.example/feed").unwrap();
        assert!(store.get("https://a.example/feed").unwrap().is_none());

        let err = registrar.remove_feed("https://a.example/feed").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
