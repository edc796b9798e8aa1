//! Change Feed Configuration
//!
//! ## FeedConfig
//!
//! Describes where things live inside the store:
//!
//! - **container**: Name of the feed's root container (default: `$blobchangefeed`).
//!   Shard paths inside segment manifests are prefixed with it.
//! - **segments_prefix**: Where segment manifests are listed (default: `idx/segments/`)
//! - **meta_path**: Feed-level metadata; its absence means the feed isn't enabled
//!   (default: `meta/segments.json`)
//! - **default_page_size**: Page size used when a caller asks for 0 events
//!   (default: 5000)
//!
//! ## FeedOptions
//!
//! Per-open parameters: start/end time, a cursor to resume from, and a cancellation
//! token checked around every download and listing.
//!
//! ## Usage
//!
//! ```ignore
//! use changefeed_storage::{FeedConfig, FeedOptions};
//!
//! let config = FeedConfig {
//!     default_page_size: 100,
//!     ..Default::default()
//! };
//!
//! let options = FeedOptions::default()
//!     .with_start_time(start)
//!     .with_cancellation(token.clone());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cursor::ChangeFeedCursor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Root container name, stripped from manifest shard paths
    #[serde(default = "default_container")]
    pub container: String,

    /// Prefix under which segment manifests are listed
    #[serde(default = "default_segments_prefix")]
    pub segments_prefix: String,

    /// Feed metadata object holding `lastConsumable`
    #[serde(default = "default_meta_path")]
    pub meta_path: String,

    /// Page size used when the caller passes 0
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            segments_prefix: default_segments_prefix(),
            meta_path: default_meta_path(),
            default_page_size: default_page_size(),
        }
    }
}

fn default_container() -> String {
    "$blobchangefeed".to_string()
}

fn default_segments_prefix() -> String {
    "idx/segments/".to_string()
}

fn default_meta_path() -> String {
    "meta/segments.json".to_string()
}

fn default_page_size() -> usize {
    5000
}

/// Options for opening a change feed
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub cursor: Option<ChangeFeedCursor>,
    pub cancellation: Option<CancellationToken>,
}

impl FeedOptions {
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Resume from a cursor; its end time replaces `end_time`
    pub fn with_cursor(mut self, cursor: ChangeFeedCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: FeedConfig = serde_json::from_str(r#"{"default_page_size": 10}"#).unwrap();
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.container, "$blobchangefeed");
        assert_eq!(config.segments_prefix, "idx/segments/");
        assert_eq!(config.meta_path, "meta/segments.json");
    }

    #[test]
    fn test_default_matches_empty_document() {
        let config: FeedConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FeedConfig::default());
    }
}
