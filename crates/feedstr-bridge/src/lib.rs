//! feedstr bridge daemon components.
//!
//! This crate wires the pure content pipeline from `feedstr-core` into a
//! running bridge:
//!
//! - [`store`] - SQLite feed record store with idempotent migration
//! - [`health`] - per-feed health state machine with fixed-interval backoff
//! - [`fetch`] - feed fetching and parsing under a fixed timeout
//! - [`favicon`] - icon discovery for feeds without a declared image
//! - [`scheduler`] - periodic metadata/scrape batches over a bounded worker pool
//! - [`pipeline`] - per-item timestamp resolution, age filter, and publishing
//! - [`publisher`] - per-destination relay delivery with partial-failure tolerance
//! - [`registrar`] - the single-feed add pipeline shared by CLI and jobs
//! - [`jobs`] - pollable background add-feed jobs
//! - [`routes`]/[`state`] - the HTTP API
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ticks    ┌────────────┐   items    ┌────────────┐
//! │  Timers   ├───────────►│ Scheduler  ├───────────►│  Pipeline  │
//! └───────────┘            │ (worker    │            │ (resolve,  │
//!                          │  pool +    │            │  filter,   │
//! ┌───────────┐  submit    │  health    │            │  sign)     │
//! │ HTTP API  ├──────┐     │  gate)     │            └─────┬──────┘
//! └───────────┘      ▼     └─────┬──────┘                  │
//!                ┌────────┐      │ health            ┌─────▼──────┐
//!                │  Jobs  │      ▼                   │ Publisher  │
//!                └───┬────┘ ┌──────────┐             │ (per-relay │
//!                    └─────►│FeedStore │             │  fan-out)  │
//!        (registrar path)   └──────────┘             └────────────┘
//! ```

pub mod config;
pub mod error;
pub mod favicon;
pub mod fetch;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod pipeline;
pub mod publisher;
pub mod registrar;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};

pub use fetch::{FeedFetcher, FetchedFeed};
pub use health::{FeedHealth, FeedState};
pub use jobs::{AsyncJob, JobStatus, JobTable};
pub use pipeline::ContentPipeline;
pub use publisher::{NostrTransport, Publisher, RelayTransport};
pub use registrar::Registrar;
pub use scheduler::{BatchKind, BatchStats, Scheduler};
pub use state::AppState;
pub use store::{FeedRecord, FeedStore};
