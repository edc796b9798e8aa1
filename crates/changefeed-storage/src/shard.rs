//! Shard: an ordered run of chunks
//!
//! A shard lists the chunk files under its prefix once, on first use, and reads them
//! in sorted order. Only the head chunk is ever downloaded.
//!
//! ## Position
//!
//! The shard tracks `chunk_index` (which chunk of the sorted listing is at the head)
//! and `event_index` (events consumed from it). When the head chunk runs dry and
//! another chunk is queued, the head is dropped and the position moves to
//! `(chunk_index + 1, 0)`. The last chunk is kept even when drained: in a segment that
//! isn't finalized the producer may still append to it, and the cursor must keep
//! pointing at its end.
//!
//! ## Resuming
//!
//! ```text
//! ShardCursor { chunk_index: 2, event_index: 5 }
//!
//!   chunk 0   chunk 1   chunk 2          chunk 3
//!   ───────   ───────   ─────────────    ───────
//!   dropped   dropped   5 decoded and    queued
//!   unread    unread    discarded, then
//!                       normal reads
//! ```
//!
//! The container format has no index, so skipping inside a chunk means decoding.

use std::collections::VecDeque;

use crate::chunk::Chunk;
use crate::cursor::ShardCursor;
use crate::error::{Error, Result};
use crate::event::ChangeFeedEvent;
use crate::store::LogClient;

pub struct Shard {
    client: LogClient,
    prefix: String,
    chunks: VecDeque<Chunk>,
    listed: bool,
    chunk_index: u64,
    event_index: u64,
}

impl Shard {
    pub fn new(client: LogClient, prefix: impl Into<String>) -> Self {
        Self::resume(client, prefix, ShardCursor::default())
    }

    /// A shard that starts reading at `cursor`
    pub fn resume(client: LogClient, prefix: impl Into<String>, cursor: ShardCursor) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            chunks: VecDeque::new(),
            listed: false,
            chunk_index: cursor.chunk_index,
            event_index: cursor.event_index,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn cursor(&self) -> ShardCursor {
        ShardCursor {
            chunk_index: self.chunk_index,
            event_index: self.event_index,
        }
    }

    pub async fn has_next(&mut self) -> Result<bool> {
        self.ensure_listed().await?;

        loop {
            let head = match self.chunks.front_mut() {
                Some(head) => head,
                None => return Ok(false),
            };
            if head.has_next().await? {
                return Ok(true);
            }
            if self.chunks.len() == 1 {
                return Ok(false);
            }
            self.advance_chunk();
        }
    }

    /// Next event of the shard
    ///
    /// Fails with `InvalidOperation` when `has_next` would return false.
    pub async fn next(&mut self) -> Result<ChangeFeedEvent> {
        if !self.has_next().await? {
            return Err(Error::InvalidOperation(format!(
                "shard {} has no more events",
                self.prefix
            )));
        }

        let head = self.chunks.front_mut().ok_or_else(|| {
            Error::InvalidOperation(format!("shard {} has no chunks", self.prefix))
        })?;
        let event = head.next().await;
        // A malformed event still used up its item
        self.event_index = head.events_read();
        event
    }

    fn advance_chunk(&mut self) {
        if let Some(done) = self.chunks.pop_front() {
            tracing::trace!(path = %done.path(), events = done.events_read(), "Finished chunk");
        }
        self.chunk_index += 1;
        self.event_index = 0;
    }

    async fn ensure_listed(&mut self) -> Result<()> {
        if self.listed {
            return Ok(());
        }

        let paths = self.client.list(&self.prefix).await?;
        let skip_chunks = usize::try_from(self.chunk_index).unwrap_or(usize::MAX);
        if skip_chunks > 0 && skip_chunks >= paths.len() {
            return Err(Error::InvalidCursor(format!(
                "shard {} has {} chunks, cursor points at chunk {}",
                self.prefix,
                paths.len(),
                self.chunk_index
            )));
        }

        let mut chunks: VecDeque<Chunk> = paths
            .into_iter()
            .skip(skip_chunks)
            .map(|path| Chunk::new(self.client.clone(), path))
            .collect();

        // Only a completed skip counts; a failed one is redone from a fresh listing
        if self.event_index > 0 {
            if let Some(head) = chunks.front_mut() {
                let skipped = head.skip(self.event_index).await?;
                if skipped < self.event_index {
                    tracing::warn!(
                        path = %head.path(),
                        expected = self.event_index,
                        skipped,
                        "Chunk holds fewer events than the cursor recorded"
                    );
                    self.event_index = skipped;
                }
            }
        }
        self.chunks = chunks;
        self.listed = true;

        tracing::debug!(
            prefix = %self.prefix,
            chunks = self.chunks.len(),
            chunk_index = self.chunk_index,
            event_index = self.event_index,
            "Listed shard"
        );
        Ok(())
    }
}
