//! Feed record store.
//!
//! One SQLite database row per registered feed, keyed by URL. The store
//! holds one shared connection behind a mutex; workers and the async add
//! path borrow it for the duration of one operation, which serializes all
//! writes.

mod schema;

use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::health::{FeedHealth, FeedState};

/// One registered feed as persisted.
#[derive(Debug, Clone)]
pub struct FeedRecord {
    /// Feed URL, the unique key.
    pub url: String,
    /// Hex public identity key. Generated once, never rotated.
    pub public_key: String,
    /// Hex secret signing key.
    pub secret_key: String,
    /// Health data mutated by every fetch attempt.
    pub health: FeedHealth,
}

/// Shared handle to the feed record store.
pub struct FeedStore {
    conn: Mutex<Connection>,
}

impl FeedStore {
    /// Open (or create) the store at the given path.
    ///
    /// Runs the idempotent schema migration on every open.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::init_schema(&conn)?;

        tracing::info!(path = %path.display(), "feed store opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// All registered feeds.
    pub fn all_feeds(&self) -> Result<Vec<FeedRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT url, pub, sec, state, failure_count, last_success, last_failure FROM feeds",
        )?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Look up one feed by URL.
    pub fn get(&self, url: &str) -> Result<Option<FeedRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT url, pub, sec, state, failure_count, last_success, last_failure
                 FROM feeds WHERE url = ?",
                [url],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Insert a newly registered feed.
    ///
    /// The URL is the primary key; inserting an already-registered URL
    /// returns [`Error::Duplicate`], so a feed can never end up with two
    /// identities.
    pub fn insert(&self, record: &FeedRecord) -> Result<()> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO feeds (url, pub, sec, state, failure_count, last_success, last_failure)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                record.url,
                record.public_key,
                record.secret_key,
                record.health.state.as_str(),
                record.health.failure_count,
                record.health.last_success,
                record.health.last_failure,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::Duplicate(record.url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a feed. Returns [`Error::NotFound`] if no record exists.
    pub fn delete(&self, url: &str) -> Result<()> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM feeds WHERE url = ?", [url])?;
        if deleted == 0 {
            return Err(Error::NotFound(url.to_string()));
        }
        Ok(())
    }

    /// Record a failed fetch: increment the counter, stamp the failure time,
    /// and flip to broken at the threshold. Returns the updated health.
    pub fn record_failure(&self, url: &str, threshold: u32) -> Result<FeedHealth> {
        let now = unix_now();
        let conn = self.conn.lock();

        let mut health = read_health(&conn, url)?;
        health.on_failure(threshold, now);
        write_health(&conn, url, &health)?;

        Ok(health)
    }

    /// Record a successful fetch: back to active, counter reset.
    pub fn record_success(&self, url: &str) -> Result<FeedHealth> {
        let now = unix_now();
        let conn = self.conn.lock();

        let mut health = read_health(&conn, url)?;
        health.on_success(now);
        write_health(&conn, url, &health)?;

        Ok(health)
    }

    /// Number of registered feeds.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM feeds", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedRecord> {
    let state_str: String = row.get(3)?;
    Ok(FeedRecord {
        url: row.get(0)?,
        public_key: row.get(1)?,
        secret_key: row.get(2)?,
        health: FeedHealth {
            state: FeedState::from_str(&state_str).unwrap_or_default(),
            failure_count: row.get(4)?,
            last_success: row.get(5)?,
            last_failure: row.get(6)?,
        },
    })
}

fn read_health(conn: &Connection, url: &str) -> Result<FeedHealth> {
    let health = conn
        .query_row(
            "SELECT state, failure_count, last_success, last_failure FROM feeds WHERE url = ?",
            [url],
            |row| {
                let state_str: String = row.get(0)?;
                Ok(FeedHealth {
                    state: FeedState::from_str(&state_str).unwrap_or_default(),
                    failure_count: row.get(1)?,
                    last_success: row.get(2)?,
                    last_failure: row.get(3)?,
                })
            },
        )
        .optional()?;

    health.ok_or_else(|| Error::NotFound(url.to_string()))
}

fn write_health(conn: &Connection, url: &str, health: &FeedHealth) -> Result<()> {
    conn.execute(
        "UPDATE feeds SET state = ?, failure_count = ?, last_success = ?, last_failure = ?
         WHERE url = ?",
        rusqlite::params![
            health.state.as_str(),
            health.failure_count,
            health.last_success,
            health.last_failure,
            url,
        ],
    )?;
    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}
