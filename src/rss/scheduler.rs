//! Feed fetch scheduler.
//!
//! On every tick the scheduler claims the stalest feed (marking it fetched
//! before any network I/O), fetches it and ingests its items. One feed per
//! tick, strictly serial. Failures are logged and never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ScraperConfig;
use crate::error::FetchError;
use crate::rss::fetcher::FeedSource;
use crate::rss::ingest::PostIngester;
use crate::rss::storage::StorageGateway;
use crate::rss::types::{Feed, IngestResult};
use crate::{GatorError, Result};

/// Timing of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Feeds fetched more recently than this are not refetched.
    pub min_refetch_interval: Option<Duration>,
}

impl SchedulerConfig {
    /// Create a config with the given tick interval. Zero is rejected.
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(GatorError::Validation(
                "scrape interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            interval,
            min_refetch_interval: None,
        })
    }

    /// Tick interval plus the refetch floor from the scraper settings.
    pub fn from_scraper(interval: Duration, scraper: &ScraperConfig) -> Result<Self> {
        Ok(Self::new(interval)?.with_min_refetch_interval(scraper.min_refetch_interval()))
    }

    /// Set the minimum time between two fetches of the same feed.
    pub fn with_min_refetch_interval(mut self, min: Option<Duration>) -> Self {
        self.min_refetch_interval = min.filter(|d| !d.is_zero());
        self
    }

    fn due_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let min = chrono::Duration::from_std(self.min_refetch_interval?).ok()?;
        now.checked_sub_signed(min)
    }
}

/// What a single scheduler tick did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The feed table is empty.
    NoFeedsAvailable,
    /// Every feed was fetched within the minimum refetch interval.
    NothingDue,
    /// Claiming the next feed failed.
    StorageFailed(GatorError),
    /// The feed was claimed but could not be fetched or parsed.
    FetchFailed { feed: Feed, error: FetchError },
    /// The feed was fetched and its items ingested.
    Ingested { feed: Feed, result: IngestResult },
}

/// Drives the claim, fetch and ingest cycle on a timer.
pub struct FetchScheduler {
    storage: Arc<dyn StorageGateway>,
    source: Arc<dyn FeedSource>,
    ingester: PostIngester,
    config: SchedulerConfig,
}

impl FetchScheduler {
    /// Create a scheduler.
    pub fn new(
        storage: Arc<dyn StorageGateway>,
        source: Arc<dyn FeedSource>,
        config: SchedulerConfig,
    ) -> Self {
        let ingester = PostIngester::new(Arc::clone(&storage));
        Self {
            storage,
            source,
            ingester,
            config,
        }
    }

    /// Run one tick: claim the stalest feed, fetch it, ingest it.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let now = Utc::now();
        let due_before = self.config.due_before(now);

        let feed = match self.storage.claim_next_feed(now, due_before).await {
            Ok(Some(feed)) => feed,
            Ok(None) => {
                debug!("no feed due for fetching");
                return CycleOutcome::NothingDue;
            }
            Err(GatorError::NotFound(_)) => {
                info!("no feeds available to fetch");
                return CycleOutcome::NoFeedsAvailable;
            }
            Err(e) => {
                error!(error = %e, "failed to claim next feed");
                return CycleOutcome::StorageFailed(e);
            }
        };

        info!(feed_id = %feed.id, url = %feed.url, "fetching feed {}", feed.name);
        let doc = match self.source.fetch(&feed.url).await {
            Ok(doc) => doc,
            Err(error) => {
                warn!(feed_id = %feed.id, url = %feed.url, error = %error, "failed to fetch feed");
                return CycleOutcome::FetchFailed { feed, error };
            }
        };

        let result = self.ingester.ingest(&feed, &doc).await;
        info!(
            feed_id = %feed.id,
            seen = result.seen,
            inserted = result.inserted,
            duplicates = result.duplicates,
            failed = result.failed,
            "feed {} ingested",
            feed.name
        );
        CycleOutcome::Ingested { feed, result }
    }

    /// Run cycles until `shutdown` becomes true or its sender is dropped.
    ///
    /// The first cycle runs immediately. Shutdown is only observed between
    /// cycles, so a cycle in progress always completes.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Collecting feeds every {:?}",
            self.config.interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            self.run_cycle().await;
        }

        info!("Feed scheduler stopped");
    }

    /// Run the loop on a background task.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            self.run_until(shutdown_rx).await;
        });
        SchedulerHandle { shutdown_tx, join }
    }
}

/// Handle to a scheduler running on a background task.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request shutdown and wait for the current cycle to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "scheduler task failed");
        }
    }
}

/// Run the scheduler until Ctrl-C.
pub async fn run_scraping_cycle_forever(
    storage: Arc<dyn StorageGateway>,
    source: Arc<dyn FeedSource>,
    config: SchedulerConfig,
) -> Result<()> {
    let handle = FetchScheduler::new(storage, source, config).spawn();

    let signal = tokio::signal::ctrl_c().await;
    info!("Shutdown requested, finishing current cycle");
    handle.stop().await;

    signal?;
    Ok(())
}
