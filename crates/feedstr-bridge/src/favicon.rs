//! Favicon discovery for feeds that declare no image.
//!
//! Fallback policy: probe a short list of conventional icon paths on the
//! feed's origin with lightweight HEAD checks, then scan the origin's HTML
//! for icon `<link>` tags (preferring URLs that hint at a larger size), and
//! finally fall back to the configured default image.

use std::sync::LazyLock;

use regex::Regex;

/// Conventional icon locations, larger/modern formats first.
const ICON_PATHS: &[&str] = &[
    "/apple-touch-icon.png",
    "/apple-touch-icon-precomposed.png",
    "/icon.svg",
    "/favicon.png",
    "/favicon.ico",
];

// Icon link tags appear with either attribute order in the wild.
static LINK_REL_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link[^>]+rel=["'](?:apple-touch-icon|icon|shortcut icon)["'][^>]+href=["']([^"']+)["']"#)
        .expect("icon link regex should compile")
});

static LINK_HREF_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link[^>]+href=["']([^"']+)["'][^>]+rel=["'](?:apple-touch-icon|icon|shortcut icon)["']"#)
        .expect("icon link regex should compile")
});

/// Discover an icon for the feed's origin, or return the default image.
pub async fn discover(client: &reqwest::Client, feed_url: &str, default_image: &str) -> String {
    let origin = match url::Url::parse(feed_url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => match parsed.port() {
                Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
                None => format!("{}://{}", parsed.scheme(), host),
            },
            None => return default_image.to_string(),
        },
        Err(_) => return default_image.to_string(),
    };

    // Conventional paths first: a HEAD probe is enough to check existence.
    for icon_path in ICON_PATHS {
        let candidate = format!("{origin}{icon_path}");
        if let Ok(response) = client.head(&candidate).send().await {
            if response.status().is_success() {
                return candidate;
            }
        }
    }

    // Fall back to scanning the origin's HTML for icon links.
    let response = match client.get(&origin).send().await {
        Ok(r) if r.status().is_success() => r,
        _ => return default_image.to_string(),
    };

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);
    if !is_html {
        return default_image.to_string();
    }

    let html = match response.text().await {
        Ok(body) => body,
        Err(_) => return default_image.to_string(),
    };

    match scan_html(&html, &origin) {
        Some(icon) => icon,
        None => default_image.to_string(),
    }
}

/// Extract the best icon URL from HTML, preferring size hints (180/192).
fn scan_html(html: &str, origin: &str) -> Option<String> {
    let mut best: Option<String> = None;

    for re in [&*LINK_REL_FIRST_RE, &*LINK_HREF_FIRST_RE] {
        for captures in re.captures_iter(html) {
            let mut icon_url = captures[1].to_string();
            if icon_url.starts_with('/') {
                icon_url = format!("{origin}{icon_url}");
            }
            if icon_url.contains("192") || icon_url.contains("180") {
                return Some(icon_url);
            }
            if best.is_none() {
                best = Some(icon_url);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEFAULT: &str = "https://img.example/default.png";

    #[test]
    fn test_scan_html_prefers_size_hint() {
        let html = r#"
            <link rel="icon" href="/small.png">
            <link rel="apple-touch-icon" href="/icon-192.png">
        "#;
        assert_eq!(
            scan_html(html, "https://example.com"),
            Some("https://example.com/icon-192.png".to_string())
        );
    }

    #[test]
    fn test_scan_html_reverse_attribute_order() {
        let html = r#"<link href="/fav.ico" rel="shortcut icon">"#;
        assert_eq!(
            scan_html(html, "https://example.com"),
            Some("https://example.com/fav.ico".to_string())
        );
    }

    #[test]
    fn test_scan_html_absolute_url_kept() {
        let html = r#"<link rel="icon" href="https://cdn.example/fav.png">"#;
        assert_eq!(
            scan_html(html, "https://example.com"),
            Some("https://cdn.example/fav.png".to_string())
        );
    }

    #[test]
    fn test_scan_html_no_icons() {
        assert_eq!(scan_html("<p>no icons here</p>", "https://example.com"), None);
    }

    #[tokio::test]
    async fn test_discover_via_head_probe() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/apple-touch-icon.png"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        // Everything else 404s.
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let feed_url = format!("{}/feed.xml", server.uri());
        let icon = discover(&client, &feed_url, DEFAULT).await;
        assert_eq!(icon, format!("{}/apple-touch-icon.png", server.uri()));
    }

    #[tokio::test]
    async fn test_discover_falls_back_to_html_scan() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"<link rel="icon" href="/fav.png">"#, "text/html"),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let feed_url = format!("{}/feed.xml", server.uri());
        let icon = discover(&client, &feed_url, DEFAULT).await;
        assert_eq!(icon, format!("{}/fav.png", server.uri()));
    }

    #[tokio::test]
    async fn test_discover_default_when_nothing_found() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("plain", "text/plain"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let feed_url = format!("{}/feed.xml", server.uri());
        assert_eq!(discover(&client, &feed_url, DEFAULT).await, DEFAULT);
    }

    #[tokio::test]
    async fn test_discover_bad_url_returns_default() {
        let client = reqwest::Client::new();
        assert_eq!(discover(&client, "not a url", DEFAULT).await, DEFAULT);
    }
}
