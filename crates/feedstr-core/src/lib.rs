//! Core content pipeline for the feedstr bridge.
//!
//! This crate turns raw feed entries into signed Nostr events and holds the
//! pure pieces the daemon builds on:
//! - Per-feed signing identities ([`identity`])
//! - Transient feed item/metadata shapes ([`item`])
//! - Timestamp resolution with configurable date formats ([`dates`])
//! - Allow-list sanitization and body assembly ([`content`])
//! - Note and profile-metadata event construction ([`note`])
//!
//! No I/O happens here; fetching, persistence, and delivery live in
//! `feedstr-bridge`.

mod error;

pub mod content;
pub mod dates;
pub mod identity;
pub mod item;
pub mod note;

pub use error::{Error, Result};

pub use dates::DateFormats;
pub use identity::{npub_from_hex, FeedIdentity};
pub use item::{FeedInfo, FeedItem};
