//! Feed, follow and post types for Gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{decode_id, decode_timestamp};
use crate::{GatorError, Result};

/// Maximum length of a feed name.
pub const MAX_FEED_NAME_LENGTH: usize = 200;

/// A subscribed RSS/Atom source.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    /// Feed ID.
    pub id: Uuid,
    /// Display name chosen when the feed was added.
    pub name: String,
    /// Feed URL, unique across all feeds.
    pub url: String,
    /// User who added the feed.
    pub user_id: Uuid,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
    /// Last fetch attempt, `None` until the scheduler first claims the feed.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Row type for feeds from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: String,
    pub name: String,
    pub url: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_fetched_at: Option<String>,
}

impl TryFrom<FeedRow> for Feed {
    type Error = GatorError;

    fn try_from(row: FeedRow) -> Result<Self> {
        Ok(Feed {
            id: decode_id("feeds.id", &row.id)?,
            name: row.name,
            url: row.url,
            user_id: decode_id("feeds.user_id", &row.user_id)?,
            created_at: decode_timestamp("feeds.created_at", &row.created_at)?,
            updated_at: decode_timestamp("feeds.updated_at", &row.updated_at)?,
            last_fetched_at: row
                .last_fetched_at
                .as_deref()
                .map(|s| decode_timestamp("feeds.last_fetched_at", s))
                .transpose()?,
        })
    }
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Owner.
    pub user_id: Uuid,
}

impl NewFeed {
    /// Create a new feed request.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user_id,
        }
    }

    /// Check the name is present and the URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GatorError::Validation("feed name is empty".to_string()));
        }
        if self.name.chars().count() > MAX_FEED_NAME_LENGTH {
            return Err(GatorError::Validation(format!(
                "feed name longer than {MAX_FEED_NAME_LENGTH} characters"
            )));
        }
        crate::rss::fetcher::validate_url(&self.url)
            .map_err(|e| GatorError::Validation(e.to_string()))
    }
}

/// A feed together with the name of the user who added it.
#[derive(Debug, Clone)]
pub struct FeedWithOwner {
    pub feed: Feed,
    pub user_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct FeedWithOwnerRow {
    #[sqlx(flatten)]
    pub feed: FeedRow,
    pub user_name: String,
}

impl TryFrom<FeedWithOwnerRow> for FeedWithOwner {
    type Error = GatorError;

    fn try_from(row: FeedWithOwnerRow) -> Result<Self> {
        Ok(FeedWithOwner {
            feed: Feed::try_from(row.feed)?,
            user_name: row.user_name,
        })
    }
}

/// A user following a feed, with both names joined in.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedFollow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Name of the following user.
    pub user_name: String,
    /// Name of the followed feed.
    pub feed_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct FeedFollowRow {
    pub id: String,
    pub user_id: String,
    pub feed_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub user_name: String,
    pub feed_name: String,
}

impl TryFrom<FeedFollowRow> for FeedFollow {
    type Error = GatorError;

    fn try_from(row: FeedFollowRow) -> Result<Self> {
        Ok(FeedFollow {
            id: decode_id("feed_follows.id", &row.id)?,
            user_id: decode_id("feed_follows.user_id", &row.user_id)?,
            feed_id: decode_id("feed_follows.feed_id", &row.feed_id)?,
            created_at: decode_timestamp("feed_follows.created_at", &row.created_at)?,
            updated_at: decode_timestamp("feed_follows.updated_at", &row.updated_at)?,
            user_name: row.user_name,
            feed_name: row.feed_name,
        })
    }
}

/// One ingested entry of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Post ID.
    pub id: Uuid,
    /// Feed the post was ingested from.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Link to the article, unique across all posts.
    pub url: String,
    /// Description, `None` when the item had none.
    pub description: Option<String>,
    /// Publication time, or ingestion time when the feed date was unreadable.
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: String,
    pub feed_id: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<PostRow> for Post {
    type Error = GatorError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: decode_id("posts.id", &row.id)?,
            feed_id: decode_id("posts.feed_id", &row.feed_id)?,
            title: row.title,
            url: row.url,
            description: row.description,
            published_at: decode_timestamp("posts.published_at", &row.published_at)?,
            created_at: decode_timestamp("posts.created_at", &row.created_at)?,
            updated_at: decode_timestamp("posts.updated_at", &row.updated_at)?,
        })
    }
}

/// New post for creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl NewPost {
    /// Create a new post with no description.
    pub fn new(
        feed_id: Uuid,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id,
            title: title.into(),
            url: url.into(),
            description: None,
            published_at,
        }
    }

    /// Set the description. Empty text is stored as no description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }
}

/// Parsed feed document as returned by the fetcher.
///
/// Never persisted; it lives only for one fetch-then-ingest call chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    /// Channel title.
    pub title: String,
    /// Channel description.
    pub description: String,
    /// Channel link.
    pub link: String,
    /// Items in document order.
    pub items: Vec<ParsedItem>,
}

/// One item of a parsed feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publication date exactly as it appeared in the document.
    pub pub_date: String,
}

impl ParsedItem {
    /// Create an item with the given fields.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
        pub_date: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: description.into(),
            pub_date: pub_date.into(),
        }
    }
}

/// Counts reported by one ingestion pass.
///
/// `seen == inserted + duplicates + failed` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestResult {
    /// Items looked at.
    pub seen: usize,
    /// Items stored as new posts.
    pub inserted: usize,
    /// Items skipped because their url was already stored.
    pub duplicates: usize,
    /// Items rejected for any other reason.
    pub failed: usize,
}
