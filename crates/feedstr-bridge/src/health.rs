//! Feed health state machine.
//!
//! Every fetch attempt feeds this machine. A feed starts `Active`; once its
//! consecutive-failure counter reaches the configured threshold it becomes
//! `Broken` and is only retried after a fixed cooldown. Any successful fetch
//! returns it to `Active` and resets the counter. The backoff is a fixed
//! interval, not exponential.

use std::time::Duration;

/// Feed health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedState {
    /// Fetched normally on every batch.
    #[default]
    Active,
    /// Failing repeatedly; retried only after the cooldown.
    Broken,
}

impl FeedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Broken => "broken",
        }
    }
}

impl std::str::FromStr for FeedState {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "broken" => Ok(Self::Broken),
            _ => Err(()),
        }
    }
}

/// Persisted health data for one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedHealth {
    pub state: FeedState,
    pub failure_count: u32,
    /// Unix seconds of the last successful fetch.
    pub last_success: Option<i64>,
    /// Unix seconds of the last failed fetch.
    pub last_failure: Option<i64>,
}

impl FeedHealth {
    /// Whether the scheduler should attempt a fetch now.
    ///
    /// Active feeds are always eligible. A broken feed is eligible only once
    /// the retry interval has elapsed since its last recorded failure; a
    /// broken feed with no recorded failure time is eligible immediately.
    pub fn is_eligible(&self, now: i64, retry_interval: Duration) -> bool {
        match self.state {
            FeedState::Active => true,
            FeedState::Broken => match self.last_failure {
                Some(last_failure) => now - last_failure >= retry_interval.as_secs() as i64,
                None => true,
            },
        }
    }

    /// Record a failed fetch. The counter increments regardless of state;
    /// reaching the threshold flips the feed to broken.
    pub fn on_failure(&mut self, threshold: u32, now: i64) {
        self.failure_count += 1;
        self.last_failure = Some(now);
        if self.failure_count >= threshold {
            self.state = FeedState::Broken;
        }
    }

    /// Record a successful fetch: back to active, counter reset.
    pub fn on_success(&mut self, now: i64) {
        self.state = FeedState::Active;
        self.failure_count = 0;
        self.last_success = Some(now);
        self.last_failure = None;
    }
}
