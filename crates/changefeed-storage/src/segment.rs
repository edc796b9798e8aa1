//! Segment: one time slice of the feed
//!
//! A segment is described by a manifest listing its shards. Shards are logically
//! concurrent partitions, so a page takes events from them in turn rather than
//! draining one shard before starting the next.
//!
//! ## Round Robin
//!
//! ```text
//! shards:  A = [a0, a1]   B = [b0, b1, b2]   C = [c0]
//!
//! page:    a0 b0 c0 a1 b1 b2
//!                         └─ A and C are exhausted, only B is left
//! ```
//!
//! Exhausted shards leave the rotation (`active`) but keep their slot in `shards` so
//! the cursor still has one entry per shard ordinal.
//!
//! ## Resuming
//!
//! Shard cursors are matched to the manifest's shards by position. A manifest that
//! gained shards since the cursor was taken starts the new ones from the beginning; a
//! cursor with more shards than the manifest is rejected.
//!
//! ## Failed Pages
//!
//! A page either comes back whole or not at all. When a download or decode fails
//! mid-page, the segment rewinds to the cursor it had when the page started, so a
//! retry (or a cursor taken after the error) neither skips nor repeats events.

use chrono::{DateTime, Utc};

use crate::cursor::SegmentCursor;
use crate::error::{Error, Result};
use crate::event::ChangeFeedEvent;
use crate::manifest::SegmentManifest;
use crate::shard::Shard;
use crate::store::LogClient;

pub struct Segment {
    client: LogClient,
    path: String,
    time: DateTime<Utc>,
    container: String,
    manifest: Option<SegmentManifest>,
    resume_from: Option<SegmentCursor>,
    shards: Vec<Shard>,
    /// Ordinals of shards that may still have events, in rotation order
    active: Vec<usize>,
    /// Index into `active` of the shard whose turn is next
    position: usize,
}

impl Segment {
    pub fn new(
        client: LogClient,
        path: impl Into<String>,
        time: DateTime<Utc>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            time,
            container: container.into(),
            manifest: None,
            resume_from: None,
            shards: Vec::new(),
            active: Vec::new(),
            position: 0,
        }
    }

    /// A segment that starts reading at `cursor`
    pub fn resume(
        client: LogClient,
        path: impl Into<String>,
        time: DateTime<Utc>,
        container: impl Into<String>,
        cursor: SegmentCursor,
    ) -> Self {
        let mut segment = Self::new(client, path, time, container);
        segment.resume_from = Some(cursor);
        segment
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Whether the producer has finished this segment
    pub async fn is_finalized(&mut self) -> Result<bool> {
        self.ensure_loaded().await?;
        Ok(self.manifest.as_ref().map_or(false, SegmentManifest::is_finalized))
    }

    pub async fn has_next(&mut self) -> Result<bool> {
        self.ensure_loaded().await?;

        while !self.active.is_empty() {
            if self.position >= self.active.len() {
                self.position = 0;
            }
            let ordinal = self.active[self.position];
            if self.shards[ordinal].has_next().await? {
                return Ok(true);
            }
            self.retire_current();
        }
        Ok(false)
    }

    /// Collect up to `page_size` events, one shard at a time
    ///
    /// Fails with `InvalidOperation` when no shard is left. On any error the segment
    /// is back where it was before the call.
    pub async fn get_page(&mut self, page_size: usize) -> Result<Vec<ChangeFeedEvent>> {
        let start = self.cursor();
        let page = self.collect_page(page_size).await;
        if page.is_err() {
            self.rewind(Some(start));
        }
        page
    }

    /// Forget everything read and start over from `cursor`, or from the beginning
    ///
    /// Nothing is fetched until the segment is next used.
    pub(crate) fn rewind(&mut self, cursor: Option<SegmentCursor>) {
        tracing::debug!(segment = %self.path, "Rewinding segment");
        self.manifest = None;
        self.resume_from = cursor;
        self.shards.clear();
        self.active.clear();
        self.position = 0;
    }

    async fn collect_page(&mut self, page_size: usize) -> Result<Vec<ChangeFeedEvent>> {
        self.ensure_loaded().await?;
        if self.active.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "segment {} has no remaining shards",
                self.path
            )));
        }

        let mut events = Vec::with_capacity(page_size.min(1024));
        while events.len() < page_size && !self.active.is_empty() {
            if self.position >= self.active.len() {
                self.position = 0;
            }
            let ordinal = self.active[self.position];
            let shard = &mut self.shards[ordinal];
            if shard.has_next().await? {
                events.push(shard.next().await?);
                self.position = (self.position + 1) % self.active.len();
            } else {
                self.retire_current();
            }
        }
        Ok(events)
    }

    /// Current position; before the manifest is loaded this is the resume cursor
    pub fn cursor(&self) -> SegmentCursor {
        if self.manifest.is_none() {
            if let Some(cursor) = &self.resume_from {
                return cursor.clone();
            }
        }

        let shard_index = self
            .active
            .get(self.position)
            .or_else(|| self.active.first())
            .copied()
            .unwrap_or(0);

        SegmentCursor {
            segment_path: self.path.clone(),
            segment_time: self.time,
            shard_cursors: self.shards.iter().map(Shard::cursor).collect(),
            shard_index,
        }
    }

    fn retire_current(&mut self) {
        let ordinal = self.active.remove(self.position);
        tracing::debug!(
            segment = %self.path,
            shard = %self.shards[ordinal].prefix(),
            "Shard exhausted"
        );
        if self.position >= self.active.len() {
            self.position = 0;
        }
    }

    async fn ensure_loaded(&mut self) -> Result<()> {
        if self.manifest.is_some() {
            return Ok(());
        }

        let data = self.client.download(&self.path).await?;
        let manifest = SegmentManifest::parse(&self.path, &data)?;
        let prefixes = manifest.shard_prefixes(&self.container);

        // The resume cursor is only used up once the shards are built from it
        let shard_cursors = self
            .resume_from
            .as_ref()
            .map(|cursor| cursor.shard_cursors.as_slice())
            .unwrap_or_default();
        if shard_cursors.len() > prefixes.len() {
            return Err(Error::InvalidCursor(format!(
                "segment {} has {} shards, cursor has {}",
                self.path,
                prefixes.len(),
                shard_cursors.len()
            )));
        }

        self.shards = prefixes
            .into_iter()
            .enumerate()
            .map(|(ordinal, prefix)| {
                let cursor = shard_cursors.get(ordinal).copied().unwrap_or_default();
                Shard::resume(self.client.clone(), prefix, cursor)
            })
            .collect();
        self.active = (0..self.shards.len()).collect();
        self.position = self
            .resume_from
            .take()
            .and_then(|cursor| self.active.iter().position(|&o| o == cursor.shard_index))
            .unwrap_or(0);

        tracing::info!(
            segment = %self.path,
            shards = self.shards.len(),
            finalized = manifest.is_finalized(),
            "Loaded segment"
        );
        self.manifest = Some(manifest);
        Ok(())
    }
}
