//! Error types for the bridge daemon.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the bridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Record store error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP fetch error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response was not a parseable feed.
    #[error("feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    /// Content pipeline error.
    #[error(transparent)]
    Core(#[from] feedstr_core::Error),

    /// Input failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A record for this feed URL already exists.
    #[error("feed already registered: {0}")]
    Duplicate(String),

    /// No record for this feed URL.
    #[error("feed not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_display() {
        let err = Error::Duplicate("https://example.com/feed".to_string());
        let msg = err.to_string();
        assert!(msg.contains("already registered"));
        assert!(msg.contains("example.com"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
