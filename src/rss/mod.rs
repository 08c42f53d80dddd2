//! Feed aggregation module for Gator.
//!
//! This module provides feed subscription, the background scraper and the
//! post store it feeds.

pub mod fetcher;
pub mod ingest;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod types;

pub use fetcher::{parse_feed, validate_url, FeedFetcher, FeedSource};
pub use ingest::PostIngester;
pub use repository::{FeedFollowRepository, FeedRepository, PostRepository};
pub use scheduler::{
    run_scraping_cycle_forever, CycleOutcome, FetchScheduler, SchedulerConfig, SchedulerHandle,
};
pub use service::{FeedService, DEFAULT_BROWSE_LIMIT};
pub use storage::{SqlStorage, StorageGateway};
pub use types::{
    Feed, FeedFollow, FeedWithOwner, IngestResult, NewFeed, NewPost, ParsedFeed, ParsedItem, Post,
    MAX_FEED_NAME_LENGTH,
};
