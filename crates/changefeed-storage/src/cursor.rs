//! Change Feed Cursors
//!
//! A cursor is the exact read position in a change feed, serialized as JSON so it can
//! be stored anywhere and handed back to resume reading after a restart.
//!
//! ## Hierarchy
//!
//! ```text
//! ChangeFeedCursor
//! ├── version: 1
//! ├── urlHash: hex(sha256(feed url))
//! ├── endTime: optional bound carried across resumes
//! └── currentSegment: SegmentCursor
//!     ├── segmentPath / segmentTime
//!     ├── shardIndex: shard the next round-robin turn starts at
//!     └── shardCursors[]: one per shard, by shard ordinal
//!         ├── chunkIndex: chunk being read (index into the sorted chunk list)
//!         └── eventIndex: events already consumed from that chunk
//! ```
//!
//! ## Invariants
//!
//! - Resuming from a cursor skips exactly the events consumed before it was taken.
//! - A cursor only resumes the feed it came from (`urlHash`) and only if its version
//!   is understood.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const CURSOR_VERSION: u32 = 1;

/// Position inside one shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardCursor {
    pub chunk_index: u64,
    pub event_index: u64,
}

/// Position inside one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCursor {
    pub segment_path: String,
    pub segment_time: DateTime<Utc>,
    pub shard_cursors: Vec<ShardCursor>,
    pub shard_index: usize,
}

/// Position in a whole change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeedCursor {
    pub version: u32,
    pub url_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// `None` only when the feed had no segments to read
    pub current_segment: Option<SegmentCursor>,
}

impl ChangeFeedCursor {
    pub fn new(
        url: &str,
        end_time: Option<DateTime<Utc>>,
        current_segment: Option<SegmentCursor>,
    ) -> Self {
        Self {
            version: CURSOR_VERSION,
            url_hash: url_hash(url),
            end_time,
            current_segment,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let cursor: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidCursor(format!("not a cursor document: {}", e)))?;
        if cursor.version != CURSOR_VERSION {
            return Err(Error::InvalidCursor(format!(
                "unsupported cursor version {}",
                cursor.version
            )));
        }
        Ok(cursor)
    }

    /// Check that this cursor may resume the feed at `url`
    pub fn validate_for(&self, url: &str) -> Result<()> {
        if self.version != CURSOR_VERSION {
            return Err(Error::InvalidCursor(format!(
                "unsupported cursor version {}",
                self.version
            )));
        }
        let expected = url_hash(url);
        if self.url_hash != expected {
            return Err(Error::CursorMismatch {
                expected,
                found: self.url_hash.clone(),
            });
        }
        Ok(())
    }
}

/// Identity of a feed as stored in cursors
pub fn url_hash(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cursor() -> ChangeFeedCursor {
        ChangeFeedCursor::new(
            "memory://feed",
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()),
            Some(SegmentCursor {
                segment_path: "idx/segments/2024/05/01/1000/meta.json".to_string(),
                segment_time: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
                shard_cursors: vec![
                    ShardCursor {
                        chunk_index: 2,
                        event_index: 17,
                    },
                    ShardCursor::default(),
                ],
                shard_index: 1,
            }),
        )
    }

    #[test]
    fn test_json_round_trip() {
        let saved = cursor();
        let json = saved.to_json().unwrap();
        assert_eq!(ChangeFeedCursor::from_json(&json).unwrap(), saved);

        let empty = ChangeFeedCursor::new("memory://feed", None, None);
        let json = empty.to_json().unwrap();
        assert!(!json.contains("endTime"));
        assert_eq!(ChangeFeedCursor::from_json(&json).unwrap(), empty);
    }

    #[test]
    fn test_document_shape() {
        let json: serde_json::Value = serde_json::to_value(cursor()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["currentSegment"]["shardIndex"], 1);
        assert_eq!(json["currentSegment"]["shardCursors"][0]["chunkIndex"], 2);
        assert_eq!(json["currentSegment"]["shardCursors"][0]["eventIndex"], 17);
        assert_eq!(json["urlHash"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut json: serde_json::Value = serde_json::to_value(cursor()).unwrap();
        json["version"] = 2.into();
        assert!(matches!(
            ChangeFeedCursor::from_json(&json.to_string()),
            Err(Error::InvalidCursor(_))
        ));
        assert!(matches!(
            ChangeFeedCursor::from_json("{\"version\": 1}"),
            Err(Error::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_cursor_bound_to_url() {
        let cursor = cursor();
        assert!(cursor.validate_for("memory://feed").is_ok());
        assert!(matches!(
            cursor.validate_for("memory://other"),
            Err(Error::CursorMismatch { .. })
        ));
    }
}
