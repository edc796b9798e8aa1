//! Change Feed Reader
//!
//! `ChangeFeed` is the entry point: it discovers segments, hands out pages of events
//! and produces the cursor that resumes reading later.
//!
//! ## Open Flow
//!
//! ```text
//! open(store, options)
//!     ↓
//! meta/segments.json exists? ── no ──▶ LogNotEnabledOrProvisioning
//!     ↓ yes
//! read lastConsumable
//!     ↓
//! cursor given? → validate version + url hash, start at its segment
//!     ↓
//! list idx/segments/, keep */meta.json, parse YYYY/MM/DD/HHMM
//!     ↓
//! keep segments with  floor_hour(start) ≤ time ≤ floor_hour(end)
//!                and  time ≤ lastConsumable
//!     ↓
//! queue Segments in time order (the cursor's segment resumes mid-way)
//! ```
//!
//! ## Reading
//!
//! `get_page` drains the head segment, drops it once exhausted and moves on to the
//! next, until the page is full or the feed runs out. `None` means nothing is left.
//!
//! After the last segment is drained the cursor keeps pointing at that segment's
//! final position. A segment that wasn't finalized may grow, and resuming from that
//! cursor later picks up what the producer appended.
//!
//! A page that fails part way returns only the error. Every segment the page touched
//! goes back to where it stood before the call, segments it finished are queued
//! again, and the cursor is unchanged. Retrying `get_page` returns the same events a
//! successful first attempt would have.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Arc::new(ObjectStoreLog::new(object_store, "s3://account/$blobchangefeed"));
//! let mut feed = ChangeFeed::open(store, FeedOptions::default()).await?;
//!
//! while let Some(page) = feed.get_page(1000).await? {
//!     for event in &page.events {
//!         println!("{} {}", event.event_type, event.subject);
//!     }
//!     save(page.cursor.to_json()?);
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::{FeedConfig, FeedOptions};
use crate::cursor::{ChangeFeedCursor, SegmentCursor};
use crate::error::{Error, Result};
use crate::event::ChangeFeedEvent;
use crate::manifest::{floor_to_hour, segment_time, FeedMetadata};
use crate::segment::Segment;
use crate::store::{LogClient, LogStore};

const MANIFEST_FILE: &str = "meta.json";

/// Events plus the cursor positioned right after them
#[derive(Debug, Clone)]
pub struct Page {
    pub events: Vec<ChangeFeedEvent>,
    pub cursor: ChangeFeedCursor,
}

pub struct ChangeFeed {
    client: LogClient,
    config: FeedConfig,
    end_time: Option<DateTime<Utc>>,
    last_consumable: DateTime<Utc>,
    segments: VecDeque<Segment>,
    /// Position of the most recently finished segment
    last_cursor: Option<SegmentCursor>,
}

impl ChangeFeed {
    pub async fn open(store: Arc<dyn LogStore>, options: FeedOptions) -> Result<Self> {
        Self::open_with_config(store, FeedConfig::default(), options).await
    }

    pub async fn open_with_config(
        store: Arc<dyn LogStore>,
        config: FeedConfig,
        options: FeedOptions,
    ) -> Result<Self> {
        let client = LogClient::new(store, options.cancellation);

        if !client.exists(&config.meta_path).await? {
            return Err(Error::LogNotEnabledOrProvisioning(client.url().to_string()));
        }
        let meta = client.download(&config.meta_path).await?;
        let last_consumable = FeedMetadata::parse(&config.meta_path, &meta)?.last_consumable;

        let (start_time, end_time, resume_from) = match options.cursor {
            Some(cursor) => {
                cursor.validate_for(client.url())?;
                let start = cursor
                    .current_segment
                    .as_ref()
                    .map(|segment| segment.segment_time)
                    .or(options.start_time);
                (start, cursor.end_time, cursor.current_segment)
            }
            None => (options.start_time, options.end_time, None),
        };

        let mut feed = Self {
            client,
            config,
            end_time,
            last_consumable,
            segments: VecDeque::new(),
            last_cursor: resume_from.clone(),
        };
        feed.discover(start_time, resume_from).await?;

        tracing::info!(
            url = %feed.client.url(),
            segments = feed.segments.len(),
            last_consumable = %feed.last_consumable,
            "Opened change feed"
        );
        Ok(feed)
    }

    /// Newest time the producer has declared safe to read
    pub fn last_consumable(&self) -> DateTime<Utc> {
        self.last_consumable
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Segments not yet drained, oldest first
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub async fn has_next(&mut self) -> Result<bool> {
        while let Some(head) = self.segments.front_mut() {
            if head.has_next().await? {
                return Ok(true);
            }
            if let Some(done) = self.segments.pop_front() {
                tracing::info!(segment = %done.path(), "Finished segment");
                self.last_cursor = Some(done.cursor());
            }
        }
        Ok(false)
    }

    /// Next page of at most `page_size` events (0 means the configured default)
    ///
    /// Returns `None` once the feed has nothing left to read.
    pub async fn get_page(&mut self, page_size: usize) -> Result<Option<Page>> {
        let page_size = if page_size == 0 {
            self.config.default_page_size
        } else {
            page_size
        };

        if !self.has_next().await? {
            return Ok(None);
        }

        let start = self.segments.front().map(Segment::cursor);
        let last = self.last_cursor.clone();
        let mut drained = Vec::new();

        match self.collect(page_size, &mut drained).await {
            Ok(events) => Ok(Some(Page {
                events,
                cursor: self.cursor(),
            })),
            Err(e) => {
                tracing::warn!(error = %e, drained = drained.len(), "Page failed, rewinding");
                let touched = drained.len() + 1;
                for segment in drained.into_iter().rev() {
                    self.segments.push_front(segment);
                }
                for (i, segment) in self.segments.iter_mut().take(touched).enumerate() {
                    // Only the first segment had progress before this page
                    segment.rewind(if i == 0 { start.clone() } else { None });
                }
                self.last_cursor = last;
                Err(e)
            }
        }
    }

    async fn collect(
        &mut self,
        page_size: usize,
        drained: &mut Vec<Segment>,
    ) -> Result<Vec<ChangeFeedEvent>> {
        let mut events = Vec::new();
        while events.len() < page_size {
            let Some(head) = self.segments.front_mut() else {
                break;
            };
            if head.has_next().await? {
                events.extend(head.get_page(page_size - events.len()).await?);
            } else if let Some(done) = self.segments.pop_front() {
                tracing::info!(segment = %done.path(), "Finished segment");
                self.last_cursor = Some(done.cursor());
                drained.push(done);
            }
        }
        Ok(events)
    }

    /// Position right after the last event returned
    pub fn cursor(&self) -> ChangeFeedCursor {
        let current = self
            .segments
            .front()
            .map(Segment::cursor)
            .or_else(|| self.last_cursor.clone());
        ChangeFeedCursor::new(self.client.url(), self.end_time, current)
    }

    /// Pages as a stream, ending when the feed is exhausted
    pub fn into_pages(self, page_size: usize) -> impl Stream<Item = Result<Page>> {
        futures::stream::try_unfold(self, move |mut feed| async move {
            let page = feed.get_page(page_size).await?;
            Ok::<_, Error>(page.map(|page| (page, feed)))
        })
    }

    async fn discover(
        &mut self,
        start_time: Option<DateTime<Utc>>,
        mut resume_from: Option<SegmentCursor>,
    ) -> Result<()> {
        let start = start_time.map(floor_to_hour);
        let end = self.end_time.map(floor_to_hour);

        let mut found = Vec::new();
        for path in self.client.list(&self.config.segments_prefix).await? {
            if !path.ends_with(MANIFEST_FILE) {
                continue;
            }
            let time = segment_time(&path)?;
            if start.map_or(false, |start| time < start)
                || end.map_or(false, |end| time > end)
                || time > self.last_consumable
            {
                continue;
            }
            found.push((time, path));
        }
        found.sort();

        for (time, path) in found {
            let segment = match resume_from.take() {
                Some(cursor) if cursor.segment_path == path => Segment::resume(
                    self.client.clone(),
                    path,
                    time,
                    self.config.container.clone(),
                    cursor,
                ),
                other => {
                    resume_from = other;
                    Segment::new(self.client.clone(), path, time, self.config.container.clone())
                }
            };
            self.segments.push_back(segment);
        }

        if let Some(cursor) = resume_from {
            tracing::warn!(
                segment = %cursor.segment_path,
                "Cursor segment no longer listed, continuing with later segments"
            );
        }
        Ok(())
    }
}
