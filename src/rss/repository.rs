//! Feed, follow and post repositories for Gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{
    Feed, FeedFollow, FeedFollowRow, FeedRow, FeedWithOwner, FeedWithOwnerRow, NewFeed, NewPost,
    Post, PostRow,
};
use crate::datetime::to_db_timestamp;
use crate::db::DbPool;
use crate::{GatorError, Result};

const FEED_COLUMNS: &str =
    "id, name, url, user_id, created_at, updated_at, last_fetched_at";

// Row lock for the claim subquery. SQLite serializes writers on its own.
#[cfg(feature = "sqlite")]
const CLAIM_LOCK: &str = "";
#[cfg(feature = "postgres")]
const CLAIM_LOCK: &str = "FOR UPDATE SKIP LOCKED";

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    ///
    /// Fails with `DuplicateKey` if a feed with the same URL exists.
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        new_feed.validate()?;

        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());
        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_feed.name)
        .bind(&new_feed.url)
        .bind(new_feed.user_id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| GatorError::NotFound("feed".to_string()))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// List all feeds with their owner's name, oldest first.
    pub async fn list_with_owner(&self) -> Result<Vec<FeedWithOwner>> {
        let rows = sqlx::query_as::<_, FeedWithOwnerRow>(
            r#"
            SELECT f.id, f.name, f.url, f.user_id, f.created_at, f.updated_at,
                   f.last_fetched_at, u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at ASC, f.name ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(FeedWithOwner::try_from).collect()
    }

    /// Get the stalest feed: never-fetched feeds first, then the oldest
    /// `last_fetched_at`, ties broken by creation time and then id.
    pub async fn next_to_fetch(&self) -> Result<Option<Feed>> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Record a fetch attempt.
    ///
    /// `last_fetched_at` never moves backwards; an older `at` only touches
    /// `updated_at`. Returns false if the feed does not exist.
    pub async fn mark_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let at = to_db_timestamp(&at);
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < $1 THEN $2
                    ELSE last_fetched_at
                END,
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(&at)
        .bind(&at)
        .bind(&at)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically select the stalest feed and mark it fetched at `at`.
    ///
    /// With `due_before` set, only feeds never fetched or last fetched at or
    /// before that instant are eligible. Returns `None` when no feed is
    /// eligible. As with [`Self::mark_fetched`], `last_fetched_at` never
    /// moves backwards.
    pub async fn claim_next(
        &self,
        at: DateTime<Utc>,
        due_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Feed>> {
        let due_filter = if due_before.is_some() {
            "WHERE last_fetched_at IS NULL OR last_fetched_at <= $3"
        } else {
            ""
        };
        let query = format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < $1 THEN $1
                    ELSE last_fetched_at
                END,
                updated_at = $2
            WHERE id = (
                SELECT id FROM feeds
                {due_filter}
                ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
                LIMIT 1
                {CLAIM_LOCK}
            )
            RETURNING {FEED_COLUMNS}
            "#
        );

        let at = to_db_timestamp(&at);
        let mut q = sqlx::query_as::<_, FeedRow>(&query).bind(&at).bind(&at);
        if let Some(cutoff) = due_before {
            q = q.bind(to_db_timestamp(&cutoff));
        }
        let row = q.fetch_optional(self.pool).await?;

        row.map(Feed::try_from).transpose()
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

const FOLLOW_SELECT: &str = r#"
    SELECT ff.id, ff.user_id, ff.feed_id, ff.created_at, ff.updated_at,
           u.name AS user_name, f.name AS feed_name
    FROM feed_follows ff
    JOIN users u ON u.id = ff.user_id
    JOIN feeds f ON f.id = ff.feed_id
"#;

/// Repository for feed follow operations.
pub struct FeedFollowRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedFollowRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Follow a feed.
    ///
    /// Fails with `DuplicateKey` if the user already follows it.
    pub async fn create(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollow> {
        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());
        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(feed_id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| GatorError::NotFound("feed follow".to_string()))
    }

    /// Get a follow by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<FeedFollow>> {
        let query = format!("{FOLLOW_SELECT} WHERE ff.id = $1");
        let row = sqlx::query_as::<_, FeedFollowRow>(&query)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(FeedFollow::try_from).transpose()
    }

    /// List the follows of a user in the order they were made.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>> {
        let query = format!("{FOLLOW_SELECT} WHERE ff.user_id = $1 ORDER BY ff.created_at ASC");
        let rows = sqlx::query_as::<_, FeedFollowRow>(&query)
            .bind(user_id.to_string())
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(FeedFollow::try_from).collect()
    }

    /// Remove a follow. Returns false if the user did not follow the feed.
    pub async fn delete(&self, user_id: Uuid, feed_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = $1 AND feed_id = $2")
            .bind(user_id.to_string())
            .bind(feed_id.to_string())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

const POST_COLUMNS: &str =
    "id, feed_id, title, url, description, published_at, created_at, updated_at";

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a post.
    ///
    /// Fails with `DuplicateKey` if a post with the same URL exists.
    pub async fn create(&self, new_post: &NewPost) -> Result<Post> {
        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());
        sqlx::query(
            r#"
            INSERT INTO posts (id, feed_id, title, url, description, published_at,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.to_string())
        .bind(new_post.feed_id.to_string())
        .bind(&new_post.title)
        .bind(&new_post.url)
        .bind(&new_post.description)
        .bind(to_db_timestamp(&new_post.published_at))
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get_by_url(&new_post.url)
            .await?
            .ok_or_else(|| GatorError::NotFound("post".to_string()))
    }

    /// Get a post by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE url = $1");
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        row.map(Post::try_from).transpose()
    }

    /// Newest posts from the feeds a user follows.
    pub async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id, p.feed_id, p.title, p.url, p.description, p.published_at,
                   p.created_at, p.updated_at
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = $1
            ORDER BY p.published_at DESC, p.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    /// Count posts of one feed.
    pub async fn count_by_feed(&self, feed_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = $1")
            .bind(feed_id.to_string())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count all posts.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
