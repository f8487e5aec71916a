//! Daemon configuration loaded from environment variables.

use std::time::Duration;

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite feed store.
    pub db_path: std::path::PathBuf,

    /// How often the scrape batch runs.
    pub fetch_interval: Duration,

    /// How often the metadata-refresh batch runs.
    pub metadata_interval: Duration,

    /// Maximum item age for history backfill of newly added feeds.
    pub history_window: Duration,

    /// How long a broken feed waits before the next retry.
    pub broken_retry_interval: Duration,

    /// Consecutive failures before a feed is marked broken.
    pub max_failures: u32,

    /// Worker pool size for scheduled batches.
    pub max_workers: usize,

    /// Relay destinations messages are published to.
    pub relays: Vec<String>,

    /// Domain used in the per-feed identity binding (`<feed url>@<domain>`).
    pub nip05_domain: String,

    /// Image used when a feed declares none and favicon discovery fails.
    pub default_feed_image: String,

    /// HTTP API bind address.
    pub bind_addr: String,

    /// Prometheus metrics port (0 disables the endpoint).
    pub metrics_port: u16,

    /// When set, delivery is replaced by logging the serialized event.
    pub dry_run: bool,

    /// Per-fetch network timeout.
    pub fetch_timeout: Duration,

    /// Per-destination publish timeout budget.
    pub publish_timeout: Duration,

    /// Maximum concurrently-executing add jobs.
    pub max_concurrent_jobs: usize,

    /// How long terminal jobs stay queryable before being purged.
    pub job_retention: Duration,

    /// Date format overrides for raw feed date text (empty = built-ins).
    pub date_formats: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable has a default suitable for local development:
    /// - `FEEDSTR_DB_PATH` (default: "./feedstr.db")
    /// - `FEEDSTR_FETCH_INTERVAL_SECS` (default: 900)
    /// - `FEEDSTR_METADATA_INTERVAL_SECS` (default: 43200)
    /// - `FEEDSTR_HISTORY_WINDOW_SECS` (default: 3600)
    /// - `FEEDSTR_BROKEN_RETRY_SECS` (default: 86400)
    /// - `FEEDSTR_MAX_FAILURES` (default: 5)
    /// - `FEEDSTR_MAX_WORKERS` (default: 5)
    /// - `FEEDSTR_RELAYS` (comma-separated, default: "wss://nostr.data.haus")
    /// - `FEEDSTR_NIP05_DOMAIN` (default: "feedstr.local")
    /// - `FEEDSTR_DEFAULT_FEED_IMAGE` (default: a generic feed icon)
    /// - `FEEDSTR_BIND_ADDR` (default: "0.0.0.0:8061")
    /// - `FEEDSTR_METRICS_PORT` (default: 9061, 0 disables)
    /// - `FEEDSTR_DRY_RUN` (default: false)
    /// - `FEEDSTR_FETCH_TIMEOUT_SECS` (default: 10)
    /// - `FEEDSTR_PUBLISH_TIMEOUT_SECS` (default: 10)
    /// - `FEEDSTR_MAX_CONCURRENT_JOBS` (default: 4)
    /// - `FEEDSTR_JOB_RETENTION_SECS` (default: 300)
    /// - `FEEDSTR_DATE_FORMATS` (comma-separated chrono formats, default: built-ins)
    pub fn from_env() -> anyhow::Result<Self> {
        let db_path = std::path::PathBuf::from(env_string("FEEDSTR_DB_PATH", "./feedstr.db"));

        let fetch_interval = Duration::from_secs(env_u64("FEEDSTR_FETCH_INTERVAL_SECS", 900)?);
        let metadata_interval =
            Duration::from_secs(env_u64("FEEDSTR_METADATA_INTERVAL_SECS", 43_200)?);
        let history_window = Duration::from_secs(env_u64("FEEDSTR_HISTORY_WINDOW_SECS", 3600)?);
        let broken_retry_interval =
            Duration::from_secs(env_u64("FEEDSTR_BROKEN_RETRY_SECS", 86_400)?);

        let max_failures = env_u64("FEEDSTR_MAX_FAILURES", 5)? as u32;
        let max_workers = (env_u64("FEEDSTR_MAX_WORKERS", 5)? as usize).max(1);

        let relays: Vec<String> = env_string("FEEDSTR_RELAYS", "wss://nostr.data.haus")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if relays.is_empty() {
            anyhow::bail!("FEEDSTR_RELAYS must contain at least one destination");
        }

        let nip05_domain = env_string("FEEDSTR_NIP05_DOMAIN", "feedstr.local");
        let default_feed_image = env_string(
            "FEEDSTR_DEFAULT_FEED_IMAGE",
            "https://upload.wikimedia.org/wikipedia/en/thumb/4/43/Feed-icon.svg/256px-Feed-icon.svg.png",
        );

        let bind_addr = env_string("FEEDSTR_BIND_ADDR", "0.0.0.0:8061");
        let metrics_port = env_u64("FEEDSTR_METRICS_PORT", 9061)? as u16;
        let dry_run = env_bool("FEEDSTR_DRY_RUN", false);

        let fetch_timeout = Duration::from_secs(env_u64("FEEDSTR_FETCH_TIMEOUT_SECS", 10)?);
        let publish_timeout = Duration::from_secs(env_u64("FEEDSTR_PUBLISH_TIMEOUT_SECS", 10)?);

        let max_concurrent_jobs = (env_u64("FEEDSTR_MAX_CONCURRENT_JOBS", 4)? as usize).max(1);
        let job_retention = Duration::from_secs(env_u64("FEEDSTR_JOB_RETENTION_SECS", 300)?);

        let date_formats: Vec<String> = std::env::var("FEEDSTR_DATE_FORMATS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        tracing::info!(
            db_path = %db_path.display(),
            fetch_interval_secs = fetch_interval.as_secs(),
            metadata_interval_secs = metadata_interval.as_secs(),
            relay_count = relays.len(),
            max_workers,
            dry_run,
            "configuration loaded"
        );

        Ok(Self {
            db_path,
            fetch_interval,
            metadata_interval,
            history_window,
            broken_retry_interval,
            max_failures,
            max_workers,
            relays,
            nip05_domain,
            default_feed_image,
            bind_addr,
            metrics_port,
            dry_run,
            fetch_timeout,
            publish_timeout,
            max_concurrent_jobs,
            job_retention,
            date_formats,
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be an integer, got '{}'", key, val)),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}
