//! Test helpers for integration tests.
//!
//! Provides database fixtures, RSS documents and a mock feed server.

#![allow(dead_code)]

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gator::config::ScraperConfig;
use gator::rss::{FeedRepository, NewFeed};
use gator::{Database, Feed, FeedFetcher, NewUser, User, UserRepository};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a fresh in-memory database.
pub async fn setup_db() -> Database {
    Database::open_in_memory()
        .await
        .expect("failed to open in-memory database")
}

/// Register a user.
pub async fn create_user(db: &Database, name: &str) -> User {
    UserRepository::new(db.pool())
        .create(&NewUser::new(name))
        .await
        .expect("failed to create user")
}

/// Add a feed owned by `user`.
pub async fn create_feed(db: &Database, user: &User, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url, user.id))
        .await
        .expect("failed to create feed")
}

/// An RSS 2.0 document with one item per `(title, link, pub_date)`.
pub fn rss_document(items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link, pub_date)| {
            format!(
                "    <item>\n      <title>{title}</title>\n      <link>{link}</link>\n      \
                 <description>About {title}</description>\n      <pubDate>{pub_date}</pubDate>\n    </item>\n"
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>http://example.test/</link>
    <description>Test description</description>
{items}  </channel>
</rss>"#
    )
}

/// The two-item document used by the end-to-end scenarios.
pub fn two_item_rss(base: &str) -> String {
    rss_document(&[
        (
            "Item 1",
            &format!("{base}/posts/1"),
            "Mon, 21 Oct 2024 07:28:00 +0000",
        ),
        (
            "Item 2",
            &format!("{base}/posts/2"),
            "Mon, 21 Oct 2024 08:00:00 GMT",
        ),
    ])
}

/// Serve `body` as an RSS feed at `route`.
pub async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Answer `route` with a bare status code.
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// A fetcher with short timeouts.
pub fn test_fetcher() -> FeedFetcher {
    let config = ScraperConfig {
        connect_timeout_secs: 2,
        request_timeout_secs: 2,
        ..ScraperConfig::default()
    };
    FeedFetcher::new(&config).expect("failed to build fetcher")
}
