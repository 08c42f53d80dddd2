//! End-to-end scraping: mock HTTP server, real fetcher, SQLite storage.

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use wiremock::MockServer;

use gator::rss::{FeedRepository, PostRepository};
use gator::{CycleOutcome, FetchScheduler, SchedulerConfig, SqlStorage};

use common::{
    create_feed, create_user, mount_feed, mount_status, setup_db, test_fetcher, two_item_rss,
    DEFAULT_TIMEOUT,
};

fn scheduler(db: &gator::Database, interval: Duration) -> FetchScheduler {
    FetchScheduler::new(
        Arc::new(SqlStorage::new(db.clone())),
        Arc::new(test_fetcher()),
        SchedulerConfig::new(interval).unwrap(),
    )
}

#[tokio::test]
async fn one_cycle_stores_posts_and_marks_feed() {
    let server = MockServer::start().await;
    mount_feed(&server, "/rss.xml", two_item_rss(&server.uri())).await;

    let db = setup_db().await;
    let user = create_user(&db, "kahya").await;
    let feed = create_feed(&db, &user, "example", &format!("{}/rss.xml", server.uri())).await;

    let before = Utc::now();
    let outcome = scheduler(&db, Duration::from_secs(60)).run_cycle().await;
    match outcome {
        CycleOutcome::Ingested { feed: claimed, result } => {
            assert_eq!(claimed.id, feed.id);
            assert_eq!(result.seen, 2);
            assert_eq!(result.inserted, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let stored = FeedRepository::new(db.pool())
        .get_by_id(feed.id)
        .await
        .unwrap()
        .unwrap();
    let fetched_at = stored.last_fetched_at.expect("feed not marked");
    assert!(fetched_at >= before - chrono::Duration::milliseconds(1));
    assert!(fetched_at <= Utc::now());

    let posts = PostRepository::new(db.pool());
    assert_eq!(posts.count().await.unwrap(), 2);
    let first = posts
        .get_by_url(&format!("{}/posts/1", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.title, "Item 1");
    assert_eq!(first.description.as_deref(), Some("About Item 1"));
    assert_eq!(
        first.published_at,
        Utc.with_ymd_and_hms(2024, 10, 21, 7, 28, 0).unwrap()
    );
    let second = posts
        .get_by_url(&format!("{}/posts/2", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second.published_at,
        Utc.with_ymd_and_hms(2024, 10, 21, 8, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn refetch_only_reports_duplicates() {
    let server = MockServer::start().await;
    mount_feed(&server, "/rss.xml", two_item_rss(&server.uri())).await;

    let db = setup_db().await;
    let user = create_user(&db, "kahya").await;
    create_feed(&db, &user, "example", &format!("{}/rss.xml", server.uri())).await;

    let scheduler = scheduler(&db, Duration::from_secs(60));
    scheduler.run_cycle().await;
    match scheduler.run_cycle().await {
        CycleOutcome::Ingested { result, .. } => {
            assert_eq!(result.inserted, 0);
            assert_eq!(result.duplicates, 2);
            assert_eq!(result.failed, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(PostRepository::new(db.pool()).count().await.unwrap(), 2);
}

#[tokio::test]
async fn broken_feed_does_not_block_others() {
    let server = MockServer::start().await;
    mount_status(&server, "/broken.xml", 500).await;
    mount_feed(&server, "/good.xml", two_item_rss(&server.uri())).await;

    let db = setup_db().await;
    let user = create_user(&db, "kahya").await;
    create_feed(&db, &user, "broken", &format!("{}/broken.xml", server.uri())).await;
    create_feed(&db, &user, "good", &format!("{}/good.xml", server.uri())).await;

    let scheduler = scheduler(&db, Duration::from_secs(60));
    assert!(matches!(
        scheduler.run_cycle().await,
        CycleOutcome::FetchFailed { .. }
    ));
    assert!(matches!(
        scheduler.run_cycle().await,
        CycleOutcome::Ingested { .. }
    ));
    // Both feeds have been visited once; the broken one is stalest again.
    match scheduler.run_cycle().await {
        CycleOutcome::FetchFailed { feed, .. } => assert_eq!(feed.name, "broken"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(PostRepository::new(db.pool()).count().await.unwrap(), 2);
}

#[tokio::test]
async fn background_scheduler_ingests_and_stops() {
    let server = MockServer::start().await;
    mount_feed(&server, "/rss.xml", two_item_rss(&server.uri())).await;

    let db = setup_db().await;
    let user = create_user(&db, "kahya").await;
    create_feed(&db, &user, "example", &format!("{}/rss.xml", server.uri())).await;

    let handle = scheduler(&db, Duration::from_millis(50)).spawn();

    let posts = PostRepository::new(db.pool());
    let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
    while posts.count().await.unwrap() < 2 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "scheduler did not ingest in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    tokio::time::timeout(DEFAULT_TIMEOUT, handle.stop())
        .await
        .expect("scheduler did not stop");
    assert_eq!(posts.count().await.unwrap(), 2);
}
