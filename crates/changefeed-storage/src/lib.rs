//! Resumable change feed reading over object storage
//!
//! A change feed is a time-ordered log of blob change events stored as container
//! files:
//!
//! ```text
//! ChangeFeed ── segments (one per time slice, from idx/segments/)
//!     └── Segment ── shards (listed in the segment manifest, read round-robin)
//!             └── Shard ── chunks (container files, read in name order)
//!                     └── Chunk ── events (decoded by changefeed-core)
//! ```
//!
//! Every level reports its position, and together those positions form a
//! `ChangeFeedCursor` that resumes reading exactly where a previous reader stopped.

pub mod blocking;
pub mod chunk;
pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod feed;
pub mod manifest;
pub mod segment;
pub mod shard;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use blocking::BlockingChangeFeed;
pub use chunk::Chunk;
pub use config::{FeedConfig, FeedOptions};
pub use cursor::{ChangeFeedCursor, SegmentCursor, ShardCursor};
pub use error::{Error, Result};
pub use event::{BlobType, ChangeFeedEvent, ChangeFeedEventData, EventType};
pub use feed::{ChangeFeed, Page};
pub use manifest::{FeedMetadata, SegmentManifest};
pub use segment::Segment;
pub use shard::Shard;
pub use store::{LogClient, LogStore, ObjectStoreLog};
