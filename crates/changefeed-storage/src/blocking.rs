//! Blocking Change Feed
//!
//! `BlockingChangeFeed` runs the async `ChangeFeed` on its own current-thread runtime
//! so callers without an async context can read a feed. Every call blocks the calling
//! thread until the underlying downloads finish. Events and cursors are exactly the
//! ones the async API would produce, since it is the same code underneath.
//!
//! Must not be used from inside a tokio runtime (`block_on` would panic there); use
//! `ChangeFeed` directly instead.

use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

use crate::config::{FeedConfig, FeedOptions};
use crate::cursor::ChangeFeedCursor;
use crate::error::{Error, Result};
use crate::feed::{ChangeFeed, Page};
use crate::store::LogStore;

pub struct BlockingChangeFeed {
    runtime: Runtime,
    inner: ChangeFeed,
}

impl BlockingChangeFeed {
    pub fn open(store: Arc<dyn LogStore>, options: FeedOptions) -> Result<Self> {
        Self::open_with_config(store, FeedConfig::default(), options)
    }

    pub fn open_with_config(
        store: Arc<dyn LogStore>,
        config: FeedConfig,
        options: FeedOptions,
    ) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        let inner = runtime.block_on(ChangeFeed::open_with_config(store, config, options))?;
        Ok(Self { runtime, inner })
    }

    pub fn has_next(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.has_next())
    }

    pub fn get_page(&mut self, page_size: usize) -> Result<Option<Page>> {
        self.runtime.block_on(self.inner.get_page(page_size))
    }

    pub fn cursor(&self) -> ChangeFeedCursor {
        self.inner.cursor()
    }

    /// The async feed underneath
    pub fn into_inner(self) -> ChangeFeed {
        self.inner
    }
}
