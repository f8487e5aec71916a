//! Shared application state for the HTTP API.

use std::sync::Arc;

use crate::config::Config;
use crate::jobs::JobTable;
use crate::registrar::Registrar;
use crate::store::FeedStore;

/// State available to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Feed record store.
    pub store: Arc<FeedStore>,
    /// Add-job table.
    pub jobs: JobTable,
    /// Single-feed registration pipeline.
    pub registrar: Arc<Registrar>,
    /// Daemon configuration.
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<FeedStore>,
        jobs: JobTable,
        registrar: Arc<Registrar>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            jobs,
            registrar,
            config,
        }
    }
}
