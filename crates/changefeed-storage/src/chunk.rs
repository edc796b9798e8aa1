//! Chunk: one container file of a shard
//!
//! A chunk is downloaded in full the first time anyone asks about its events, then
//! decoded one event at a time from memory. The buffer lives exactly as long as the
//! `Chunk`; the owning shard drops it once it moves on.
//!
//! A decode error ends the chunk: `has_next` and `next` keep failing rather than
//! reading on from wherever the bad item left the input.

use bytes::Bytes;

use changefeed_core::ContainerFileReader;

use crate::error::{Error, Result};
use crate::event::ChangeFeedEvent;
use crate::store::LogClient;

pub struct Chunk {
    client: LogClient,
    path: String,
    reader: Option<ContainerFileReader<Bytes>>,
    events_read: u64,
}

impl Chunk {
    pub fn new(client: LogClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            reader: None,
            events_read: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Events returned or skipped so far
    pub fn events_read(&self) -> u64 {
        self.events_read
    }

    pub async fn has_next(&mut self) -> Result<bool> {
        let reader = self.reader().await?;
        let (failed_at, has_next) = (reader.failed_at(), reader.has_next());

        if let Some(offset) = failed_at {
            return Err(Error::Decode {
                path: self.path.clone(),
                source: changefeed_core::Error::ReaderFailed { offset },
            });
        }
        Ok(has_next)
    }

    /// Decode the next event
    ///
    /// Fails with `InvalidOperation` once the chunk is exhausted.
    pub async fn next(&mut self) -> Result<ChangeFeedEvent> {
        let value = self.next_value().await?;
        let event = ChangeFeedEvent::from_value(&value).map_err(|reason| Error::MalformedEvent {
            path: self.path.clone(),
            reason,
        })?;
        Ok(event)
    }

    /// Decode and discard up to `count` events, returning how many were skipped
    pub async fn skip(&mut self, count: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < count && self.has_next().await? {
            self.next_value().await?;
            skipped += 1;
        }
        Ok(skipped)
    }

    async fn next_value(&mut self) -> Result<changefeed_core::Value> {
        let path = self.path.clone();
        let value = self
            .reader()
            .await?
            .next_item()
            .map_err(|source| Error::Decode { path, source })?;

        match value {
            Some(value) => {
                self.events_read += 1;
                Ok(value)
            }
            None => Err(Error::InvalidOperation(format!(
                "chunk {} has no more events",
                self.path
            ))),
        }
    }

    async fn reader(&mut self) -> Result<&mut ContainerFileReader<Bytes>> {
        if self.reader.is_none() {
            let data = self.client.download(&self.path).await?;
            let mut reader = ContainerFileReader::new(data);
            reader.open().map_err(|source| Error::Decode {
                path: self.path.clone(),
                source,
            })?;
            self.reader = Some(reader);
        }

        self.reader
            .as_mut()
            .ok_or_else(|| Error::InvalidOperation(format!("chunk {} not loaded", self.path)))
    }
}
