//! Feed and Segment Manifests
//!
//! Two small JSON documents drive discovery:
//!
//! ## Feed Metadata (`meta/segments.json`)
//!
//! ```json
//! {"version": 0, "lastConsumable": "2024-05-01T11:00:00.000Z", ...}
//! ```
//!
//! Its presence means the feed is enabled. Segments after `lastConsumable` may still
//! be half-written and are not read.
//!
//! ## Segment Manifest (`idx/segments/YYYY/MM/DD/HHMM/meta.json`)
//!
//! ```json
//! {
//!   "version": 0,
//!   "begin": "2024-05-01T10:00:00.000Z",
//!   "intervalSecs": 3600,
//!   "status": "Finalized",
//!   "chunkFilePaths": ["$blobchangefeed/log/00/2024/05/01/1000/", ...]
//! }
//! ```
//!
//! Each entry of `chunkFilePaths` is a shard prefix, written with the container name
//! in front. Any status other than `Finalized` means the producer may still add
//! shards or chunks.
//!
//! The segment's timestamp comes from its manifest path, not from `begin`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

const FINALIZED: &str = "Finalized";

/// Feed-level metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetadata {
    #[serde(default)]
    pub version: Option<i64>,
    pub last_consumable: DateTime<Utc>,
}

impl FeedMetadata {
    pub fn parse(path: &str, data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::InvalidManifest {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Contents of one segment manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentManifest {
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub begin: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    pub chunk_file_paths: Vec<String>,
}

impl SegmentManifest {
    pub fn parse(path: &str, data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::InvalidManifest {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn is_finalized(&self) -> bool {
        self.status.as_deref() == Some(FINALIZED)
    }

    /// Shard prefixes with the container name stripped
    pub fn shard_prefixes(&self, container: &str) -> Vec<String> {
        let container_prefix = format!("{}/", container.trim_end_matches('/'));
        self.chunk_file_paths
            .iter()
            .map(|path| {
                path.strip_prefix(&container_prefix)
                    .unwrap_or(path)
                    .to_string()
            })
            .collect()
    }
}

/// Timestamp encoded in a segment manifest path
///
/// `idx/segments/2024/05/01/1000/meta.json` is 2024-05-01 10:00 UTC. Only the four
/// components before the file name are interpreted.
pub fn segment_time(path: &str) -> Result<DateTime<Utc>> {
    let invalid = || Error::InvalidSegmentPath(path.to_string());

    let parts: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    if parts.len() < 5 {
        return Err(invalid());
    }
    let [year, month, day, hhmm] = [
        parts[parts.len() - 5],
        parts[parts.len() - 4],
        parts[parts.len() - 3],
        parts[parts.len() - 2],
    ];
    if hhmm.len() != 4 || !hhmm.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let number = |s: &str| s.parse::<u32>().map_err(|_| invalid());
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let (month, day) = (number(month)?, number(day)?);
    let (hour, minute) = (number(&hhmm[..2])?, number(&hhmm[2..])?);

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Round down to the start of the hour
pub fn floor_to_hour(time: DateTime<Utc>) -> DateTime<Utc> {
    let seconds = time.timestamp();
    let floored = seconds - seconds.rem_euclid(3600);
    Utc.timestamp_opt(floored, 0).single().unwrap_or(time)
}
