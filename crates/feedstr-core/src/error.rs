//! Error types for the content pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building signed feed messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Key parsing or derivation failed.
    #[error("key error: {0}")]
    Key(#[from] nostr::key::Error),

    /// Event construction or signing failed.
    #[error("event error: {0}")]
    Event(#[from] nostr::event::builder::Error),

    /// Bech32 encoding of a public key failed.
    #[error("bech32 encoding error: {0}")]
    Bech32(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
