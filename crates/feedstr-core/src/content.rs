//! Body assembly for republished feed items.
//!
//! Raw feed bodies arrive as arbitrary HTML. The pipeline reduces them to a
//! flat text-plus-URLs representation:
//!
//! 1. Sanitize with a strict allow-list: script/style/comment blocks are
//!    removed with their content, and the only markup that survives is
//!    `<img>` with an http(s) `src` and `<a>` with an http(s) `href`.
//! 2. Flatten the surviving fragments to bare URL lines. This is
//!    intentionally lossy; structural markup does not survive.
//! 3. Decode HTML entities to plain text.
//! 4. Append enclosure URLs and the item's canonical link.

use std::sync::LazyLock;

use regex::Regex;

use crate::item::FeedItem;

static SCRIPT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script\s*>").expect("script regex should compile")
});

static STYLE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style[^>]*>.*?</style\s*>").expect("style regex should compile")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex should compile"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex should compile"));

static ALLOWED_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^<img\s[^>]*src="https?://[^"]+"[^>]*>$"#)
        .expect("img allow regex should compile")
});

static ALLOWED_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^<a\s[^>]*href="https?://[^"]+"[^>]*>$"#)
        .expect("anchor allow regex should compile")
});

static ANCHOR_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^</a\s*>$").expect("anchor close regex should compile"));

static IMG_FLATTEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\s[^>]*src="(https?://[^"]+)"[^>]*>"#)
        .expect("img flatten regex should compile")
});

static ANCHOR_FLATTEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href="(https?://[^"]+)"[^>]*>.*?</a\s*>"#)
        .expect("anchor flatten regex should compile")
});

static ANCHOR_LEFTOVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)</?a(\s[^>]*)?>").expect("anchor leftover regex should compile")
});

/// Hosts that restate the item title inside the body; for these the title is
/// not prepended again.
static MIRROR_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"nitter|telegram").expect("mirror regex should compile"));

/// Strip markup down to the allow-list.
///
/// Script, style, and comment blocks are removed together with their
/// content. Of the remaining tags only `<img src="http(s)://...">`,
/// `<a href="http(s)://...">`, and `</a>` survive; everything else is
/// dropped, keeping the text between tags.
pub fn sanitize(html: &str) -> String {
    let text = SCRIPT_BLOCK_RE.replace_all(html, "");
    let text = STYLE_BLOCK_RE.replace_all(&text, "");
    let text = COMMENT_RE.replace_all(&text, "");

    TAG_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            if ALLOWED_IMG_RE.is_match(tag)
                || ALLOWED_ANCHOR_RE.is_match(tag)
                || ANCHOR_CLOSE_RE.is_match(tag)
            {
                tag.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Rewrite surviving inline media to bare URL lines.
///
/// `<img src="URL">` becomes `URL\n`; `<a href="URL">label</a>` becomes
/// `URL\n` with the label discarded. Unpaired anchor fragments left over
/// from sanitization are dropped.
pub fn flatten_media(text: &str) -> String {
    let text = IMG_FLATTEN_RE.replace_all(text, "$1\n");
    let text = ANCHOR_FLATTEN_RE.replace_all(&text, "$1\n");
    ANCHOR_LEFTOVER_RE.replace_all(&text, "").into_owned()
}

/// Decode HTML entities to plain text.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Whether an item link points at a mirror host whose body already restates
/// the title.
pub fn is_mirror_link(link: &str) -> bool {
    MIRROR_LINK_RE.is_match(link)
}

/// Assemble the full note body for one item.
pub fn render_item_body(item: &FeedItem) -> String {
    let sanitized = sanitize(&item.body);

    let text = if is_mirror_link(&item.link) || item.title.is_empty() {
        sanitized
    } else {
        format!("{}\n\n{}", item.title, sanitized)
    };

    let mut text = decode_entities(&flatten_media(&text));

    for enclosure in &item.enclosures {
        text.push_str("\n\n");
        text.push_str(enclosure);
    }

    if !item.link.is_empty() {
        text.push_str("\n\n");
        text.push_str(&item.link);
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_strips_script_keeps_allowed() {
        let html = r#"<p>hello</p><script>alert("x")</script><img src="https://example.com/a.png"/><a href="https://example.com/post">read</a>"#;
        let out = sanitize(html);
        assert!(!out.contains("script"));
        assert!(!out.contains("alert"));
        assert!(out.contains(r#"<img src="https://example.com/a.png"/>"#));
        assert!(out.contains(r#"<a href="https://example.com/post">read</a>"#));
        assert!(out.contains("hello"));
        assert!(!out.contains("<p>"));
    }

    #[test]
    fn test_sanitize_drops_non_http_schemes() {
        let html = r#"<a href="javascript:alert(1)">evil</a><img src="data:image/png;base64,xx">"#;
        let out = sanitize(html);
        assert!(!out.contains("<a"));
        assert!(!out.contains("<img"));
        // Link label text survives; the markup does not.
        assert!(out.contains("evil"));
    }

    #[test]
    fn test_sanitize_removes_style_with_content() {
        let out = sanitize("<style>body { color: red }</style>text");
        assert_eq!(out, "text");
    }

    #[test]
    fn test_flatten_media_to_bare_urls() {
        let text = r#"intro <img src="https://example.com/pic.jpg" alt="x"/> and <a href="https://example.com/page">the page</a>"#;
        let out = flatten_media(text);
        assert_eq!(
            out,
            "intro https://example.com/pic.jpg\n and https://example.com/page\n"
        );
    }

    #[test]
    fn test_flatten_drops_unpaired_anchor() {
        let out = flatten_media("before </a> after");
        assert_eq!(out, "before  after");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("fish &amp; chips &#8211; cheap"), "fish & chips – cheap");
    }

    #[test]
    fn test_render_prepends_title() {
        let item = FeedItem {
            title: "Big News".to_string(),
            body: "<p>Something happened.</p>".to_string(),
            link: "https://example.com/news/1".to_string(),
            ..Default::default()
        };
        let body = render_item_body(&item);
        assert_eq!(
            body,
            "Big News\n\nSomething happened.\n\nhttps://example.com/news/1"
        );
    }

    #[test]
    fn test_render_mirror_link_skips_title() {
        let item = FeedItem {
            title: "Big News".to_string(),
            body: "Big News: details".to_string(),
            link: "https://nitter.example.com/user/status/1".to_string(),
            ..Default::default()
        };
        let body = render_item_body(&item);
        assert!(body.starts_with("Big News: details"));
        assert!(!body.starts_with("Big News\n\n"));
    }

    #[test]
    fn test_render_appends_enclosures_then_link() {
        let item = FeedItem {
            title: "Episode 12".to_string(),
            body: "Show notes".to_string(),
            link: "https://pod.example.com/12".to_string(),
            enclosures: vec!["https://pod.example.com/12.mp3".to_string()],
            ..Default::default()
        };
        let body = render_item_body(&item);
        assert_eq!(
            body,
            "Episode 12\n\nShow notes\n\nhttps://pod.example.com/12.mp3\n\nhttps://pod.example.com/12"
        );
    }

    #[test]
    fn test_render_without_link() {
        let item = FeedItem {
            title: "Untitled".to_string(),
            body: "text".to_string(),
            ..Default::default()
        };
        let body = render_item_body(&item);
        assert_eq!(body, "Untitled\n\ntext");
    }
}
