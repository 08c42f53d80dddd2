//! Post ingestion.
//!
//! Turns the items of a parsed feed into stored posts. Items already stored
//! (same url) are skipped silently; any other failure is logged and the
//! remaining items are still processed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::datetime::parse_pub_date;
use crate::rss::storage::StorageGateway;
use crate::rss::types::{Feed, IngestResult, NewPost, ParsedFeed, ParsedItem};
use crate::GatorError;

/// Converts parsed feed items into posts.
#[derive(Clone)]
pub struct PostIngester {
    storage: Arc<dyn StorageGateway>,
}

impl PostIngester {
    /// Create an ingester writing through `storage`.
    pub fn new(storage: Arc<dyn StorageGateway>) -> Self {
        Self { storage }
    }

    /// Store every item of `doc` as a post of `feed`, in document order.
    pub async fn ingest(&self, feed: &Feed, doc: &ParsedFeed) -> IngestResult {
        let mut result = IngestResult::default();

        for item in &doc.items {
            result.seen += 1;

            if item.link.is_empty() {
                warn!(feed_id = %feed.id, title = %item.title, "item has no link, skipping");
                result.failed += 1;
                continue;
            }

            let post = build_post(feed, item, Utc::now());
            match self.storage.create_post(&post).await {
                Ok(_) => result.inserted += 1,
                Err(GatorError::DuplicateKey(_)) => {
                    debug!(feed_id = %feed.id, url = %item.link, "post already stored");
                    result.duplicates += 1;
                }
                Err(e) => {
                    warn!(feed_id = %feed.id, url = %item.link, error = %e, "failed to store post");
                    result.failed += 1;
                }
            }
        }

        result
    }
}

/// Build the post for one item. `now` stands in for an unreadable date.
fn build_post(feed: &Feed, item: &ParsedItem, now: DateTime<Utc>) -> NewPost {
    let published_at = parse_pub_date(&item.pub_date).unwrap_or_else(|| {
        if !item.pub_date.is_empty() {
            debug!(url = %item.link, pub_date = %item.pub_date, "unparseable publication date");
        }
        now
    });

    NewPost::new(feed.id, item.title.as_str(), item.link.as_str(), published_at)
        .with_description(item.description.as_str())
}

impl std::fmt::Debug for PostIngester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostIngester").finish()
    }
}
