//! Integration tests for reading and resuming a change feed

use chrono::{Duration, TimeZone, Utc};
use changefeed_storage::testing::{chunk_path, hour, FeedFixture};
use changefeed_storage::{
    ChangeFeed, ChangeFeedCursor, Error, EventType, FeedOptions, LogStore, ObjectStoreLog,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn open(fixture: &FeedFixture, options: FeedOptions) -> ChangeFeed {
    ChangeFeed::open(fixture.log_store(), options).await.unwrap()
}

async fn drain(feed: &mut ChangeFeed, page_size: usize) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(page) = feed.get_page(page_size).await.unwrap() {
        ids.extend(page.events.into_iter().map(|e| e.id));
    }
    ids
}

/// Two segments: the first with three shards, the second with one
async fn two_segment_feed() -> FeedFixture {
    let fixture = FeedFixture::new();
    fixture.put_meta(hour(2024, 5, 1, 12)).await;
    fixture
        .put_segment(
            hour(2024, 5, 1, 10),
            true,
            vec![
                vec![vec!["a0", "a1"], vec!["a2"]],
                vec![vec!["b0", "b1", "b2"]],
                vec![vec![], vec!["c0"]],
            ],
        )
        .await;
    fixture
        .put_segment(hour(2024, 5, 1, 11), true, vec![vec![vec!["d0", "d1"]]])
        .await;
    fixture
}

#[tokio::test]
async fn test_missing_metadata_means_not_enabled() {
    let fixture = FeedFixture::new();
    fixture
        .put_segment(hour(2024, 5, 1, 10), true, vec![vec![vec!["a"]]])
        .await;

    let result = ChangeFeed::open(fixture.log_store(), FeedOptions::default()).await;
    assert!(matches!(result, Err(Error::LogNotEnabledOrProvisioning(_))));
}

#[tokio::test]
async fn test_empty_feed_has_no_pages() {
    let fixture = FeedFixture::new();
    fixture.put_meta(hour(2024, 5, 1, 12)).await;

    let mut feed = open(&fixture, FeedOptions::default()).await;
    assert!(!feed.has_next().await.unwrap());
    assert!(feed.get_page(10).await.unwrap().is_none());
    assert!(feed.cursor().current_segment.is_none());
}

#[tokio::test]
async fn test_reads_every_event_once_in_segment_order() {
    let fixture = two_segment_feed().await;
    let mut feed = open(&fixture, FeedOptions::default()).await;

    let ids = drain(&mut feed, 4).await;
    assert_eq!(
        ids,
        vec!["a0", "b0", "c0", "a1", "b1", "a2", "b2", "d0", "d1"]
    );
}

#[tokio::test]
async fn test_event_fields_are_typed() {
    let fixture = two_segment_feed().await;
    let mut feed = open(&fixture, FeedOptions::default()).await;

    let page = feed.get_page(1).await.unwrap().unwrap();
    let event = &page.events[0];
    assert_eq!(event.event_type, EventType::BlobCreated);
    assert_eq!(event.subject, "/blobServices/default/containers/test/blobs/a0");
    assert_eq!(event.schema_version, Some(5));
    assert_eq!(event.data.api, "PutBlob");
    assert_eq!(event.data.content_length, Some(2));
    assert_eq!(event.data.url, None);
    assert_eq!(event.metadata_version.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_resume_from_every_page_boundary() {
    let fixture = two_segment_feed().await;
    let expected = drain(&mut open(&fixture, FeedOptions::default()).await, 100).await;

    let mut feed = open(&fixture, FeedOptions::default()).await;
    let mut consumed = 0;
    while let Some(page) = feed.get_page(1).await.unwrap() {
        consumed += page.events.len();

        // Through JSON, the way a caller would persist it
        let json = page.cursor.to_json().unwrap();
        let cursor = ChangeFeedCursor::from_json(&json).unwrap();
        assert_eq!(cursor, page.cursor);

        let mut resumed = open(&fixture, FeedOptions::default().with_cursor(cursor)).await;
        assert_eq!(
            drain(&mut resumed, 3).await,
            expected[consumed..].to_vec(),
            "resuming after {} events",
            consumed
        );
    }
    assert_eq!(consumed, expected.len());
}

#[tokio::test]
async fn test_time_window_and_last_consumable() {
    let fixture = FeedFixture::new();
    fixture.put_meta(hour(2024, 5, 1, 12)).await;
    for (h, id) in [(9, "h09"), (10, "h10"), (11, "h11"), (12, "h12"), (13, "h13")] {
        fixture
            .put_segment(hour(2024, 5, 1, h), true, vec![vec![vec![id]]])
            .await;
    }

    // Everything up to lastConsumable
    let mut feed = open(&fixture, FeedOptions::default()).await;
    assert_eq!(drain(&mut feed, 10).await, vec!["h09", "h10", "h11", "h12"]);

    // Start and end are rounded down to the hour
    let start = hour(2024, 5, 1, 10) + Duration::minutes(30);
    let end = hour(2024, 5, 1, 11) + Duration::minutes(45);
    let mut feed = open(
        &fixture,
        FeedOptions::default()
            .with_start_time(start)
            .with_end_time(end),
    )
    .await;
    assert_eq!(drain(&mut feed, 10).await, vec!["h10", "h11"]);
    assert_eq!(feed.cursor().end_time, Some(end));
}

#[tokio::test]
async fn test_end_time_survives_resume() {
    let fixture = FeedFixture::new();
    fixture.put_meta(hour(2024, 5, 1, 23)).await;
    for h in 10..14 {
        fixture
            .put_segment(hour(2024, 5, 1, h), true, vec![vec![vec!["x", "y"]]])
            .await;
    }

    let end = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
    let mut feed = open(&fixture, FeedOptions::default().with_end_time(end)).await;
    let page = feed.get_page(1).await.unwrap().unwrap();

    let mut resumed = open(&fixture, FeedOptions::default().with_cursor(page.cursor)).await;
    assert_eq!(resumed.end_time(), Some(end));
    assert_eq!(drain(&mut resumed, 10).await.len(), 3);
}

#[tokio::test]
async fn test_cursor_from_other_feed_is_rejected() {
    let fixture = two_segment_feed().await;
    let mut feed = open(&fixture, FeedOptions::default()).await;
    let cursor = feed.get_page(2).await.unwrap().unwrap().cursor;

    let other: Arc<dyn LogStore> = Arc::new(ObjectStoreLog::new(
        fixture.object_store(),
        "memory://other-account/$blobchangefeed",
    ));
    let result = ChangeFeed::open(other, FeedOptions::default().with_cursor(cursor)).await;
    assert!(matches!(result, Err(Error::CursorMismatch { .. })));
}

#[tokio::test]
async fn test_unknown_cursor_version_is_rejected() {
    let fixture = two_segment_feed().await;
    let mut cursor = open(&fixture, FeedOptions::default()).await.cursor();
    cursor.version = 7;

    let result = ChangeFeed::open(fixture.log_store(), FeedOptions::default().with_cursor(cursor)).await;
    assert!(matches!(result, Err(Error::InvalidCursor(_))));
}

#[tokio::test]
async fn test_end_of_feed_cursor_sees_appended_events() {
    let fixture = FeedFixture::new();
    fixture.put_meta(hour(2024, 5, 1, 12)).await;
    let open_segment = hour(2024, 5, 1, 10);
    fixture
        .put_segment(open_segment, false, vec![vec![vec!["a0"]], vec![vec!["b0"]]])
        .await;

    let mut feed = open(&fixture, FeedOptions::default()).await;
    assert_eq!(drain(&mut feed, 10).await, vec!["a0", "b0"]);
    let cursor = feed.cursor();
    assert_eq!(
        cursor.current_segment.as_ref().map(|s| s.segment_time),
        Some(open_segment)
    );

    // The producer adds a chunk to shard 0 and a later segment
    fixture
        .put_chunk(&chunk_path(0, open_segment, 1), &["a1"])
        .await;
    fixture
        .put_segment(hour(2024, 5, 1, 11), true, vec![vec![vec!["n0"]]])
        .await;

    let mut resumed = open(&fixture, FeedOptions::default().with_cursor(cursor)).await;
    assert_eq!(drain(&mut resumed, 10).await, vec!["a1", "n0"]);
}

#[tokio::test]
async fn test_cancellation_before_open() {
    let fixture = two_segment_feed().await;
    let token = CancellationToken::new();
    token.cancel();

    let result = ChangeFeed::open(
        fixture.log_store(),
        FeedOptions::default().with_cancellation(token),
    )
    .await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_cancellation_at_next_download() {
    let fixture = two_segment_feed().await;
    let token = CancellationToken::new();
    let mut feed = open(&fixture, FeedOptions::default().with_cancellation(token.clone())).await;

    let page = feed.get_page(1).await.unwrap().unwrap();
    assert_eq!(page.events[0].id, "a0");

    token.cancel();
    // b0 lives in a chunk that hasn't been downloaded yet
    assert!(matches!(feed.get_page(1).await, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_corrupt_chunk_surfaces_path() {
    let fixture = FeedFixture::new();
    fixture.put_meta(hour(2024, 5, 1, 12)).await;
    let time = hour(2024, 5, 1, 10);
    fixture
        .put_segment(time, true, vec![vec![vec!["a0"]]])
        .await;
    fixture
        .put_raw(&chunk_path(0, time, 0), b"Obj\x01garbage".to_vec())
        .await;

    let mut feed = open(&fixture, FeedOptions::default()).await;
    match feed.get_page(10).await {
        Err(Error::Decode { path, .. }) => assert_eq!(path, chunk_path(0, time, 0)),
        other => panic!("expected decode error, got {:?}", other.map(|_| ())),
    }
}
