//! Page metadata fetching for link previews
//!
//! Uses reqwest for the page request and the scraper crate to read the
//! document title plus the Open Graph / Twitter card meta tags.

use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::intent::absolute_url;
use crate::types::PageMetadata;

/// Fetches title, description and preview image for a web page
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl MetadataFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch metadata for `url`
    ///
    /// Never fails: any network, HTTP or decoding problem is logged and the
    /// fallback metadata (URL as title, no description, no image) is returned.
    pub async fn fetch(&self, url: &str) -> PageMetadata {
        match self.fetch_html(url).await {
            Ok(html) => parse_metadata(&html, url),
            Err(e) => {
                warn!("Error fetching metadata for {}: {}", url, e);
                PageMetadata::fallback(url)
            }
        }
    }

    async fn fetch_html(&self, url: &str) -> std::result::Result<String, reqwest::Error> {
        let response = self
            .client
            .get(absolute_url(url))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let html = response.text().await?;
        debug!("Fetched {} bytes of markup from {}", html.len(), url);

        Ok(html)
    }
}

/// Extract preview metadata from an HTML document
///
/// `page_url` is used as the title fallback and as the base for resolving a
/// relative preview image URL.
pub fn parse_metadata(html: &str, page_url: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#)
        .or_else(|| element_text(&document, "title"))
        .unwrap_or_else(|| page_url.to_string());

    let description = meta_content(&document, r#"meta[property="og:description"]"#)
        .or_else(|| meta_content(&document, r#"meta[name="description"]"#))
        .unwrap_or_default();

    let preview_image_url = meta_content(&document, r#"meta[property="og:image"]"#)
        .or_else(|| meta_content(&document, r#"meta[name="twitter:image"]"#))
        .and_then(|image| resolve_url(page_url, &image));

    PageMetadata {
        title,
        description,
        preview_image_url,
    }
}

/// Trimmed, non-empty `content` attribute of the first element matching `selector`
fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn element_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Resolve a possibly relative URL against the page it came from
fn resolve_url(page_url: &str, target: &str) -> Option<String> {
    match Url::parse(&absolute_url(page_url)).and_then(|base| base.join(target)) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(_) => Url::parse(target).ok().map(|u| u.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FULL_PAGE: &str = r#"<!doctype html>
<html><head>
  <title> Plain Title </title>
  <meta property="og:title" content="Example">
  <meta property="og:description" content="An example site">
  <meta name="description" content="Generic description">
  <meta property="og:image" content="/img.jpg">
  <meta name="twitter:image" content="https://cdn.example.com/tw.jpg">
</head><body></body></html>"#;

    fn fetcher() -> MetadataFetcher {
        MetadataFetcher::new(reqwest::Client::new(), Duration::from_secs(5))
    }

    #[test]
    fn test_open_graph_tags_win() {
        let metadata = parse_metadata(FULL_PAGE, "https://example.com/a");
        assert_eq!(metadata.title, "Example");
        assert_eq!(metadata.description, "An example site");
        assert_eq!(
            metadata.preview_image_url.as_deref(),
            Some("https://example.com/img.jpg")
        );
    }

    #[test]
    fn test_generic_fallbacks() {
        let html = r#"<html><head>
            <title>Only Title</title>
            <meta name="description" content="  Generic description ">
            <meta name="twitter:image" content="https://cdn.example.com/tw.jpg">
        </head></html>"#;
        let metadata = parse_metadata(html, "https://example.com/a");
        assert_eq!(metadata.title, "Only Title");
        assert_eq!(metadata.description, "Generic description");
        assert_eq!(
            metadata.preview_image_url.as_deref(),
            Some("https://cdn.example.com/tw.jpg")
        );
    }

    #[test]
    fn test_empty_og_title_ignored() {
        let html = r#"<html><head><title>Real</title><meta property="og:title" content=" "></head></html>"#;
        assert_eq!(parse_metadata(html, "https://example.com").title, "Real");
    }

    #[test]
    fn test_no_metadata_uses_url() {
        let metadata = parse_metadata("<html><body>hi</body></html>", "https://example.com/x");
        assert_eq!(metadata, PageMetadata::fallback("https://example.com/x"));
    }

    #[test]
    fn test_relative_image_resolution() {
        let html = r#"<meta property="og:image" content="../images/p.png">"#;
        let metadata = parse_metadata(html, "https://example.com/blog/post/");
        assert_eq!(
            metadata.preview_image_url.as_deref(),
            Some("https://example.com/blog/images/p.png")
        );
    }

    #[tokio::test]
    async fn test_fetch_parses_served_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .and(header("user-agent", "queuecast-test"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FULL_PAGE, "text/html"))
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .user_agent("queuecast-test")
            .build()
            .unwrap();
        let fetcher = MetadataFetcher::new(client, Duration::from_secs(5));

        let url = format!("{}/a", server.uri());
        let metadata = fetcher.fetch(&url).await;

        assert_eq!(metadata.title, "Example");
        assert_eq!(metadata.description, "An example site");
        assert_eq!(
            metadata.preview_image_url,
            Some(format!("{}/img.jpg", server.uri()))
        );
    }

    #[tokio::test]
    async fn test_fetch_http_error_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        assert_eq!(fetcher().fetch(&url).await, PageMetadata::fallback(&url));
    }

    #[tokio::test]
    async fn test_fetch_timeout_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(FULL_PAGE, "text/html")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let fetcher = MetadataFetcher::new(reqwest::Client::new(), Duration::from_millis(200));
        let url = format!("{}/slow", server.uri());
        assert_eq!(fetcher.fetch(&url).await, PageMetadata::fallback(&url));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_degrades() {
        let url = "http://127.0.0.1:9/nothing-listens-here";
        assert_eq!(fetcher().fetch(url).await, PageMetadata::fallback(url));
    }
}
