//! Feed service for Gator.
//!
//! High-level feed operations behind the CLI commands: adding feeds,
//! following and unfollowing them, and browsing posts.

use crate::db::{Database, User};
use crate::rss::repository::{FeedFollowRepository, FeedRepository, PostRepository};
use crate::rss::types::{Feed, FeedFollow, FeedWithOwner, NewFeed, Post};
use crate::{GatorError, Result};

/// Number of posts shown by `browse` when no limit is given.
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// Service for feed operations.
pub struct FeedService<'a> {
    db: &'a Database,
}

impl<'a> FeedService<'a> {
    /// Create a new FeedService with the given database reference.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a feed owned by `user` and follow it on their behalf.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the name or URL is invalid
    /// - a feed with the same URL already exists
    pub async fn add_feed(&self, user: &User, name: &str, url: &str) -> Result<(Feed, FeedFollow)> {
        let feed = FeedRepository::new(self.db.pool())
            .create(&NewFeed::new(name, url, user.id))
            .await
            .map_err(|e| match e {
                GatorError::DuplicateKey(_) => {
                    GatorError::Validation(format!("a feed with URL {url} already exists"))
                }
                other => other,
            })?;

        let follow = FeedFollowRepository::new(self.db.pool())
            .create(user.id, feed.id)
            .await?;

        Ok((feed, follow))
    }

    /// List every feed with the name of the user who added it.
    pub async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>> {
        FeedRepository::new(self.db.pool()).list_with_owner().await
    }

    /// Follow the feed with the given URL.
    pub async fn follow(&self, user: &User, url: &str) -> Result<FeedFollow> {
        let feed = self.feed_by_url(url).await?;

        FeedFollowRepository::new(self.db.pool())
            .create(user.id, feed.id)
            .await
            .map_err(|e| match e {
                GatorError::DuplicateKey(_) => GatorError::Validation(format!(
                    "{} already follows {}",
                    user.name, feed.name
                )),
                other => other,
            })
    }

    /// List the feeds `user` follows.
    pub async fn following(&self, user: &User) -> Result<Vec<FeedFollow>> {
        FeedFollowRepository::new(self.db.pool())
            .list_for_user(user.id)
            .await
    }

    /// Stop following the feed with the given URL. Returns the feed.
    pub async fn unfollow(&self, user: &User, url: &str) -> Result<Feed> {
        let feed = self.feed_by_url(url).await?;

        let removed = FeedFollowRepository::new(self.db.pool())
            .delete(user.id, feed.id)
            .await?;
        if !removed {
            return Err(GatorError::NotFound(format!(
                "follow of {} by {}",
                feed.name, user.name
            )));
        }
        Ok(feed)
    }

    /// Newest posts from the feeds `user` follows.
    pub async fn browse(&self, user: &User, limit: i64) -> Result<Vec<Post>> {
        if limit <= 0 {
            return Err(GatorError::Validation(
                "limit must be a positive number".to_string(),
            ));
        }
        PostRepository::new(self.db.pool())
            .list_for_user(user.id, limit)
            .await
    }

    async fn feed_by_url(&self, url: &str) -> Result<Feed> {
        FeedRepository::new(self.db.pool())
            .get_by_url(url)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("feed with URL {url}")))
    }
}
