//! Signed event construction.
//!
//! Two message kinds leave the bridge: a kind-1 text note per feed item,
//! timestamped with the item's own resolved publish time so history replays
//! keep their original ordering, and a kind-0 profile-metadata message per
//! feed, timestamped at publication time.

use chrono::{DateTime, Utc};
use nostr::{Event, EventBuilder, Metadata, Tag, TagKind, Timestamp, Url};

use crate::content::render_item_body;
use crate::error::Result;
use crate::identity::FeedIdentity;
use crate::item::{FeedInfo, FeedItem};

/// Marker recorded in the provenance tag of every bridged note.
pub const PROXY_PROTOCOL: &str = "rss";

/// Build the provenance tag for an item: the source feed URL plus the
/// percent-encoded original item link, marked as feed-bridged.
pub fn proxy_tag(feed_url: &str, item_link: &str) -> Tag {
    let escaped: String = url::form_urlencoded::byte_serialize(item_link.as_bytes()).collect();
    Tag::custom(
        TagKind::custom("proxy"),
        [
            format!("{}#{}", feed_url, escaped),
            PROXY_PROTOCOL.to_string(),
        ],
    )
}

/// Build and sign the kind-1 note for one feed item.
///
/// `created_at` is the item's resolved publish time, never wall-clock time.
pub fn build_note(
    identity: &FeedIdentity,
    feed_url: &str,
    item: &FeedItem,
    created_at: DateTime<Utc>,
) -> Result<Event> {
    let body = render_item_body(item);

    let mut tags: Vec<Tag> = item
        .categories
        .iter()
        .map(|category| Tag::hashtag(category.as_str()))
        .collect();
    tags.push(proxy_tag(feed_url, &item.link));

    let event = EventBuilder::text_note(body)
        .tags(tags)
        .custom_created_at(Timestamp::from_secs(created_at.timestamp().max(0) as u64))
        .sign_with_keys(identity.keys())?;

    Ok(event)
}

/// Build and sign the kind-0 profile-metadata message for a feed.
///
/// The body is a small JSON document: display name, about text with the feed
/// link, picture URL, and the identity binding `<feed url>@<domain>`.
pub fn build_profile(
    identity: &FeedIdentity,
    feed_url: &str,
    info: &FeedInfo,
    nip05_domain: &str,
) -> Result<Event> {
    let mut metadata = Metadata::new()
        .name(format!("{} (RSS Feed)", info.title))
        .about(format!("{}\n\n{}", info.description, info.link))
        .nip05(format!("{}@{}", feed_url, nip05_domain));

    if let Some(image) = info.image.as_deref() {
        if let Ok(picture) = Url::parse(image) {
            metadata = metadata.picture(picture);
        } else {
            tracing::warn!(url = %feed_url, image = %image, "ignoring unparseable feed image URL");
        }
    }

    let event = EventBuilder::metadata(&metadata).sign_with_keys(identity.keys())?;
    Ok(event)
}
