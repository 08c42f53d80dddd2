//! Feed fetcher.
//!
//! Fetches a feed over HTTP and parses it into a [`ParsedFeed`]. RSS 2.0
//! documents are read with the `rss` crate so the raw `<pubDate>` text is
//! kept; anything else (Atom, RSS 1.0, JSON Feed) goes through `feed-rs`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::ScraperConfig;
use crate::error::FetchError;
use crate::rss::types::{ParsedFeed, ParsedItem};
use crate::{GatorError, Result};

/// Anything that can turn a feed URL into a parsed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`. Never retries.
    async fn fetch(&self, url: &str) -> std::result::Result<ParsedFeed, FetchError>;
}

/// HTTP feed fetcher with timeouts and a body size limit.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    max_feed_size: u64,
}

impl FeedFetcher {
    /// Create a fetcher from the scraper configuration.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| GatorError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    /// Create a fetcher with a custom timeout and default everything else.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let config = ScraperConfig {
            request_timeout_secs: timeout.as_secs().max(1),
            ..ScraperConfig::default()
        };
        Self::new(&config)
    }

    async fn fetch_body(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let max = self.max_feed_size;
        if let Some(content_length) = response.content_length() {
            if content_length > max {
                return Err(FetchError::TooLarge {
                    size: content_length,
                    max,
                });
            }
        }

        // Content-Length may be missing or wrong; enforce the limit while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max {
                return Err(FetchError::TooLarge {
                    size: body.len() as u64,
                    max,
                });
            }
        }

        Ok(body)
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<ParsedFeed, FetchError> {
        validate_url(url)?;
        debug!(url, "fetching feed");

        let body = self.fetch_body(url).await?;
        let feed = parse_feed(&body)?;

        debug!(url, items = feed.items.len(), "feed parsed");
        Ok(feed)
    }
}

/// Check that a URL is absolute, uses http or https, and has a host.
pub fn validate_url(url: &str) -> std::result::Result<(), FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidUrl(format!("URL has no host: {url}")));
    }

    Ok(())
}

/// Parse a feed body.
///
/// RSS 2.0 first, then any format `feed-rs` understands.
pub fn parse_feed(bytes: &[u8]) -> std::result::Result<ParsedFeed, FetchError> {
    match ::rss::Channel::read_from(bytes) {
        Ok(channel) => Ok(from_channel(&channel)),
        Err(rss_err) => {
            debug!(error = %rss_err, "not an RSS 2.0 document, trying feed-rs");
            let feed = feed_rs::parser::parse(bytes)
                .map_err(|e| FetchError::Parse(e.to_string()))?;
            Ok(from_feed_rs(feed))
        }
    }
}

fn from_channel(channel: &::rss::Channel) -> ParsedFeed {
    let items = channel
        .items()
        .iter()
        .map(|item| ParsedItem {
            title: unescape(item.title().unwrap_or_default()),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: unescape(item.description().unwrap_or_default()),
            pub_date: item.pub_date().unwrap_or_default().trim().to_string(),
        })
        .collect();

    ParsedFeed {
        title: unescape(channel.title()),
        description: unescape(channel.description()),
        link: channel.link().trim().to_string(),
        items,
    }
}

fn from_feed_rs(feed: feed_rs::model::Feed) -> ParsedFeed {
    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let description = entry
                .summary
                .map(|t| t.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            ParsedItem {
                title: entry
                    .title
                    .map(|t| unescape(&t.content))
                    .unwrap_or_default(),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.trim().to_string())
                    .unwrap_or_default(),
                description: unescape(&description),
                // Rendered as RFC 2822 so the ingester parses every format the same way.
                pub_date: entry
                    .published
                    .or(entry.updated)
                    .map(|d| d.to_rfc2822())
                    .unwrap_or_default(),
            }
        })
        .collect();

    ParsedFeed {
        title: feed.title.map(|t| unescape(&t.content)).unwrap_or_default(),
        description: feed
            .description
            .map(|d| unescape(&d.content))
            .unwrap_or_default(),
        link: feed
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default(),
        items,
    }
}

/// Decode HTML entities left in text after XML parsing.
fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_valid() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://example.test/rss.xml").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/rss.xml").is_ok());
    }

    #[test]
    fn test_validate_url_invalid_scheme() {
        let result = validate_url("ftp://example.com/feed.xml");
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported URL scheme"));
    }

    #[test]
    fn test_validate_url_not_a_url() {
        assert!(matches!(
            validate_url("example.com/feed.xml"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(validate_url(""), Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_feed_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>A test feed</description>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <description>&lt;p&gt;Description&lt;/p&gt;</description>
      <pubDate>Mon, 21 Oct 2024 09:28:00 +0200</pubDate>
    </item>
    <item>
      <title>Second Article</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title, "Test Feed");
        assert_eq!(feed.description, "A test feed");
        assert_eq!(feed.link, "https://example.com");
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].title, "First Article");
        assert_eq!(feed.items[0].link, "https://example.com/1");
        assert_eq!(feed.items[0].description, "<p>Description</p>");
        assert_eq!(feed.items[0].pub_date, "Mon, 21 Oct 2024 09:28:00 +0200");
        assert_eq!(feed.items[1].pub_date, "");
        assert_eq!(feed.items[1].description, "");
    }

    #[test]
    fn test_parse_feed_unescapes_double_encoded_entities() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Tom &amp;amp; Jerry</title>
    <link>https://example.com</link>
    <description>It&amp;#39;s news</description>
    <item>
      <title>Caf&amp;eacute; &amp;quot;open&amp;quot;</title>
      <link>https://example.com/cafe</link>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title, "Tom & Jerry");
        assert_eq!(feed.description, "It's news");
        assert_eq!(feed.items[0].title, "Café \"open\"");
    }

    #[test]
    fn test_parse_feed_atom_fallback() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <link href="https://example.com"/>
  <id>urn:uuid:feed</id>
  <updated>2025-01-01T00:00:00Z</updated>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://example.com/entry"/>
    <summary>Entry summary</summary>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(feed.title, "Atom Feed");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title, "Atom Entry");
        assert_eq!(feed.items[0].link, "https://example.com/entry");
        assert_eq!(feed.items[0].description, "Entry summary");

        let published = crate::datetime::parse_pub_date(&feed.items[0].pub_date).unwrap();
        assert_eq!(published.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_feed_invalid() {
        let result = parse_feed(b"This is not XML");
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_fetcher_from_config() {
        let fetcher = FeedFetcher::new(&ScraperConfig::default()).unwrap();
        assert_eq!(fetcher.max_feed_size, ScraperConfig::default().max_feed_size_bytes);
        assert!(FeedFetcher::with_timeout(Duration::from_secs(5)).is_ok());
    }
}
