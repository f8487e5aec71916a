//! Asynchronous add-feed jobs.
//!
//! `submit` creates a job with an unguessable id and launches the add
//! pipeline as a detached task, returning the id immediately; `query`
//! returns a snapshot of the job's current state. Each job has exactly one
//! writer (its owning task); pollers take read locks and never observe a
//! partially written snapshot. Terminal jobs are purged after a retention
//! delay, after which a poll behaves like an unknown id.
//!
//! A semaphore bounds how many add jobs execute at once; excess submissions
//! queue inside their own task, so `submit` still returns instantly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Semaphore;

use feedstr_core::FeedIdentity;

use crate::registrar::Registrar;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Snapshot of one tracked job.
#[derive(Debug, Clone, Serialize)]
pub struct AsyncJob {
    pub id: String,
    pub url: String,
    pub status: JobStatus,
    pub message: String,
    pub error: Option<String>,
    /// Registered feed URL, set on completion.
    pub feed_url: Option<String>,
    /// Encoded public identity, set on completion.
    pub npub: Option<String>,
}

struct Inner {
    jobs: RwLock<HashMap<String, AsyncJob>>,
    admission: Semaphore,
    retention: Duration,
}

/// Concurrency-safe job table with bounded-lifetime entries.
#[derive(Clone)]
pub struct JobTable {
    inner: Arc<Inner>,
}

impl JobTable {
    pub fn new(max_concurrent: usize, retention: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                admission: Semaphore::new(max_concurrent.max(1)),
                retention,
            }),
        }
    }

    /// Create a job for `url` and launch its execution in the background.
    /// Returns the job id immediately.
    pub fn submit(&self, registrar: Arc<Registrar>, url: String) -> String {
        let id = new_job_id();
        self.create(&id, &url);
        tracing::info!(id = %id, url = %url, "created add job");

        let table = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            let _permit = match table.inner.admission.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            run_add_job(&table, &registrar, &job_id, &url).await;
            table.schedule_purge(job_id);
        });

        id
    }

    /// Snapshot the job's current state, or `None` for unknown/purged ids.
    pub fn query(&self, id: &str) -> Option<AsyncJob> {
        self.inner.jobs.read().get(id).cloned()
    }

    /// Number of tracked jobs (terminal but unpurged ones included).
    pub fn len(&self) -> usize {
        self.inner.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs.read().is_empty()
    }

    pub(crate) fn create(&self, id: &str, url: &str) {
        let job = AsyncJob {
            id: id.to_string(),
            url: url.to_string(),
            status: JobStatus::Processing,
            message: "Validating feed URL".to_string(),
            error: None,
            feed_url: None,
            npub: None,
        };
        self.inner.jobs.write().insert(id.to_string(), job);
    }

    pub(crate) fn set_message(&self, id: &str, message: &str) {
        if let Some(job) = self.inner.jobs.write().get_mut(id) {
            job.message = message.to_string();
        }
    }

    pub(crate) fn fail(&self, id: &str, error: &str) {
        if let Some(job) = self.inner.jobs.write().get_mut(id) {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
        }
        tracing::warn!(id = %id, error = %error, "add job failed");
    }

    pub(crate) fn complete(&self, id: &str, feed_url: String, npub: String) {
        if let Some(job) = self.inner.jobs.write().get_mut(id) {
            job.status = JobStatus::Completed;
            job.message = "Feed successfully added".to_string();
            job.feed_url = Some(feed_url);
            job.npub = Some(npub);
        }
        tracing::info!(id = %id, "add job completed");
    }

    /// Remove the job after the retention delay so the table stays bounded.
    pub(crate) fn schedule_purge(&self, id: String) {
        let table = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(table.inner.retention).await;
            table.inner.jobs.write().remove(&id);
            tracing::debug!(id = %id, "purged terminal job");
        });
    }
}

/// The staged add pipeline behind one job.
async fn run_add_job(table: &JobTable, registrar: &Registrar, id: &str, url: &str) {
    table.set_message(id, "Validating feed URL");
    let fetched = match registrar.validate(url).await {
        Ok(fetched) => fetched,
        Err(_) => {
            table.fail(id, "no valid feed found at URL");
            return;
        }
    };

    table.set_message(id, "Checking for duplicate feeds");
    match registrar.lookup(url) {
        Ok(Some(_)) => {
            table.fail(id, "feed already registered");
            return;
        }
        Ok(None) => {}
        Err(e) => {
            table.fail(id, &format!("record store lookup failed: {e}"));
            return;
        }
    }

    table.set_message(id, "Generating feed keys");
    let identity = FeedIdentity::generate();
    let npub = match identity.npub() {
        Ok(npub) => npub,
        Err(e) => {
            table.fail(id, &format!("failed to encode public key: {e}"));
            return;
        }
    };

    table.set_message(id, "Saving feed to record store");
    if let Err(e) = registrar.register(url, &identity) {
        table.fail(id, &format!("failed to save feed: {e}"));
        return;
    }

    if registrar.dry_run() {
        table.set_message(id, "Dry-run mode: would publish feed metadata");
    } else {
        table.set_message(id, "Publishing feed metadata");
    }
    let mut info = fetched.info.clone();
    registrar.resolve_image(url, &mut info).await;
    if let Err(e) = registrar.announce(&identity, url, &info).await {
        table.fail(id, &format!("failed to publish feed metadata: {e}"));
        return;
    }

    table.set_message(id, "Replaying feed history (this may take a while)");
    registrar.backfill(&identity, url, &fetched).await;

    table.complete(id, url.to_string(), npub);
}

/// 128 bits of randomness, hex-encoded: effectively collision-free and
/// unguessable.
fn new_job_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
