//! Storage operations consumed by the scraper.
//!
//! The scheduler and ingester only talk to storage through
//! [`StorageGateway`], so they can run against the SQL database or any
//! other backend that provides these four operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::repository::{FeedRepository, PostRepository};
use super::types::{Feed, NewPost, Post};
use crate::db::Database;
use crate::{GatorError, Result};

/// Storage interface of the scraping core.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Feed with the oldest `last_fetched_at`, never-fetched feeds first.
    ///
    /// Fails with `NotFound` when no feeds exist.
    async fn get_next_feed_to_fetch(&self) -> Result<Feed>;

    /// Set `last_fetched_at` and `updated_at` of a feed.
    ///
    /// Fails with `NotFound` for an unknown feed.
    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Select the next feed and mark it fetched at `at`.
    ///
    /// Returns `Ok(None)` when `due_before` is set and every feed was
    /// fetched after it, and `NotFound` when there are no feeds at all.
    ///
    /// The default implementation is two separate calls. Backends shared by
    /// several schedulers must override it with an atomic operation.
    async fn claim_next_feed(
        &self,
        at: DateTime<Utc>,
        due_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Feed>> {
        let mut feed = self.get_next_feed_to_fetch().await?;
        if let (Some(cutoff), Some(last)) = (due_before, feed.last_fetched_at) {
            if last > cutoff {
                return Ok(None);
            }
        }
        self.mark_feed_fetched(feed.id, at).await?;
        feed.last_fetched_at = Some(feed.last_fetched_at.map_or(at, |last| last.max(at)));
        feed.updated_at = at;
        Ok(Some(feed))
    }

    /// Insert a post. Fails with `DuplicateKey` if the url is already stored.
    async fn create_post(&self, post: &NewPost) -> Result<Post>;
}

/// [`StorageGateway`] backed by the SQL database.
#[derive(Debug, Clone)]
pub struct SqlStorage {
    db: Database,
}

impl SqlStorage {
    /// Create a gateway over an open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StorageGateway for SqlStorage {
    async fn get_next_feed_to_fetch(&self) -> Result<Feed> {
        FeedRepository::new(self.db.pool())
            .next_to_fetch()
            .await?
            .ok_or_else(|| GatorError::NotFound("feed".to_string()))
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if FeedRepository::new(self.db.pool())
            .mark_fetched(feed_id, at)
            .await?
        {
            Ok(())
        } else {
            Err(GatorError::NotFound(format!("feed {feed_id}")))
        }
    }

    async fn claim_next_feed(
        &self,
        at: DateTime<Utc>,
        due_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Feed>> {
        let repo = FeedRepository::new(self.db.pool());
        match repo.claim_next(at, due_before).await? {
            Some(feed) => Ok(Some(feed)),
            None if repo.count().await? == 0 => Err(GatorError::NotFound("feed".to_string())),
            None => Ok(None),
        }
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        PostRepository::new(self.db.pool()).create(post).await
    }
}
