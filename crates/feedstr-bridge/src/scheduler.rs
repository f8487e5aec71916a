//! Scheduled batch engine.
//!
//! Two periodic batches run over the full feed set: a metadata batch that
//! refreshes and re-announces each feed's profile, and a scrape batch that
//! fetches new items and pushes them through the content pipeline. A batch
//! distributes records over a single shared queue to a bounded pool of
//! workers and does not return until every worker has drained the queue.
//!
//! Batches serialize behind one run-lock: when a metadata tick and a scrape
//! tick fire close together, the second waits instead of interleaving
//! health updates over the same records.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use feedstr_core::FeedIdentity;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::FeedFetcher;
use crate::health::FeedState;
use crate::pipeline::ContentPipeline;
use crate::publisher::Publisher;
use crate::registrar::Registrar;
use crate::store::{FeedRecord, FeedStore};

/// Which periodic batch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// Refresh title/description/image and re-announce the profile.
    Metadata,
    /// Fetch new items and publish them.
    Scrape,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Scrape => "scrape",
        }
    }
}

/// Outcome counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Records fetched successfully.
    pub succeeded: usize,
    /// Records skipped by the health gate.
    pub skipped: usize,
    /// Records whose fetch failed.
    pub failed: usize,
}

impl BatchStats {
    fn merge(&mut self, other: BatchStats) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

enum RecordOutcome {
    Succeeded,
    Skipped,
    Failed,
}

/// Drives periodic batches over the feed set with a bounded worker pool.
pub struct Scheduler {
    store: Arc<FeedStore>,
    fetcher: Arc<FeedFetcher>,
    publisher: Arc<Publisher>,
    pipeline: Arc<ContentPipeline>,
    registrar: Arc<Registrar>,
    config: Arc<Config>,
    run_lock: tokio::sync::Mutex<()>,
}

impl Scheduler {
    pub fn new(
        store: Arc<FeedStore>,
        fetcher: Arc<FeedFetcher>,
        publisher: Arc<Publisher>,
        pipeline: Arc<ContentPipeline>,
        registrar: Arc<Registrar>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            fetcher,
            publisher,
            pipeline,
            registrar,
            config,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one batch to completion.
    ///
    /// Loads the full record set, fans it across the worker pool, and waits
    /// for every worker to exit before returning.
    pub async fn run_batch(self: &Arc<Self>, kind: BatchKind) -> Result<BatchStats> {
        let _guard = self.run_lock.lock().await;

        let feeds = self.store.all_feeds()?;
        if feeds.is_empty() {
            tracing::warn!(kind = kind.as_str(), "no feeds registered");
        }
        tracing::info!(kind = kind.as_str(), feeds = feeds.len(), "starting batch");
        metrics::counter!("batch_runs_total", "kind" => kind.as_str()).increment(1);
        metrics::gauge!("feeds_total").set(feeds.len() as f64);

        let worker_count = self.config.max_workers;
        let (tx, rx) = mpsc::channel::<FeedRecord>(worker_count);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let scheduler = Arc::clone(self);
            let rx = Arc::clone(&rx);
            workers.push(tokio::spawn(async move {
                let mut stats = BatchStats::default();
                loop {
                    let record = { rx.lock().await.recv().await };
                    let Some(record) = record else { break };
                    match scheduler.process_record(kind, record).await {
                        RecordOutcome::Succeeded => stats.succeeded += 1,
                        RecordOutcome::Skipped => stats.skipped += 1,
                        RecordOutcome::Failed => stats.failed += 1,
                    }
                }
                stats
            }));
        }

        for record in feeds {
            if tx.send(record).await.is_err() {
                break;
            }
        }
        drop(tx);

        // Completion barrier: the batch is done only when every worker has
        // drained the queue and exited.
        let mut stats = BatchStats::default();
        for worker in futures::future::join_all(workers).await {
            match worker {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(e) => tracing::error!(error = %e, "batch worker panicked"),
            }
        }

        tracing::info!(
            kind = kind.as_str(),
            succeeded = stats.succeeded,
            skipped = stats.skipped,
            failed = stats.failed,
            "batch finished"
        );
        Ok(stats)
    }

    /// Wait (bounded) for any in-flight batch to finish.
    ///
    /// Used by shutdown: acquiring the run-lock means no batch is running.
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.run_lock.lock())
            .await
            .is_ok()
    }

    async fn process_record(&self, kind: BatchKind, record: FeedRecord) -> RecordOutcome {
        let now = Utc::now().timestamp();
        if !record
            .health
            .is_eligible(now, self.config.broken_retry_interval)
        {
            tracing::info!(
                url = %record.url,
                last_failure = ?record.health.last_failure,
                "skipping broken feed"
            );
            return RecordOutcome::Skipped;
        }

        let result = match kind {
            BatchKind::Scrape => self.scrape(&record).await,
            BatchKind::Metadata => self.registrar.refresh_profile(&record).await,
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.store.record_success(&record.url) {
                    tracing::error!(url = %record.url, error = %e, "failed to record success");
                }
                metrics::counter!("feed_fetches_total", "result" => "ok").increment(1);
                RecordOutcome::Succeeded
            }
            Err(e) => {
                tracing::warn!(url = %record.url, error = %e, "feed fetch failed");
                metrics::counter!("feed_fetches_total", "result" => "error").increment(1);
                match self
                    .store
                    .record_failure(&record.url, self.config.max_failures)
                {
                    Ok(health) if health.state == FeedState::Broken => {
                        tracing::warn!(
                            url = %record.url,
                            failures = health.failure_count,
                            "feed marked broken"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(url = %record.url, error = %e, "failed to record failure");
                    }
                }
                RecordOutcome::Failed
            }
        }
    }

    /// Fetch one feed and publish its fresh items with the short window.
    async fn scrape(&self, record: &FeedRecord) -> Result<()> {
        let fetched = self.fetcher.fetch(&record.url).await?;
        tracing::debug!(url = %record.url, items = fetched.items.len(), "updating feed");

        let identity = FeedIdentity::from_secret_hex(&record.secret_key)?;
        let stats = self
            .pipeline
            .publish_items(
                &self.publisher,
                &identity,
                &record.url,
                &fetched.items,
                self.config.fetch_interval,
            )
            .await;

        tracing::debug!(
            url = %record.url,
            published = stats.published,
            "finished updating feed"
        );
        Ok(())
    }
}
