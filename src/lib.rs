//! Gator - a command-line RSS/Atom feed aggregator.
//!
//! Users register feeds and follow them; a background scraper fetches the
//! stalest feed on every tick and stores new posts, deduplicated by URL.

pub mod cli;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod rss;
pub mod session;

pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{FetchError, GatorError, Result};
pub use crate::rss::{
    run_scraping_cycle_forever, CycleOutcome, Feed, FeedFetcher, FeedService, FeedSource,
    FetchScheduler, IngestResult, NewPost, ParsedFeed, ParsedItem, Post, PostIngester,
    SchedulerConfig, SqlStorage, StorageGateway,
};
pub use session::{Session, SessionState};
