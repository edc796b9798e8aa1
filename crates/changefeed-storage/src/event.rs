//! Change Feed Events
//!
//! Chunks decode to untyped `Value` records; this module is where they become typed
//! `ChangeFeedEvent`s. Nothing past this point sees a `Value`.
//!
//! ## Record Shape
//!
//! ```text
//! BlobChangeEvent {
//!     schemaVersion: int            (optional)
//!     topic, subject, id: string
//!     eventType: enum or string     (unknown names are kept, not rejected)
//!     eventTime: RFC 3339 string
//!     data: {
//!         api: string
//!         clientRequestId, requestId, etag, contentType, url, sequencer: string?
//!         contentLength, contentOffset: long?
//!         blobType: enum or string?
//!         destinationUrl, sourceUrl: string?
//!         recursive: boolean or "true"/"false"?
//!     }
//!     dataVersion, metadataVersion: string?
//! }
//! ```
//!
//! A missing required field, or any field with an unexpected type, fails the event
//! rather than producing a partial one.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

use changefeed_core::{Record, Value};

/// Kind of change an event describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    BlobCreated,
    BlobDeleted,
    BlobPropertiesUpdated,
    BlobSnapshotCreated,
    Control,
    Unknown(String),
}

impl EventType {
    pub fn parse(name: &str) -> Self {
        match name {
            "BlobCreated" => Self::BlobCreated,
            "BlobDeleted" => Self::BlobDeleted,
            "BlobPropertiesUpdated" => Self::BlobPropertiesUpdated,
            "BlobSnapshotCreated" => Self::BlobSnapshotCreated,
            "Control" => Self::Control,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::BlobCreated => "BlobCreated",
            Self::BlobDeleted => "BlobDeleted",
            Self::BlobPropertiesUpdated => "BlobPropertiesUpdated",
            Self::BlobSnapshotCreated => "BlobSnapshotCreated",
            Self::Control => "Control",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobType {
    BlockBlob,
    PageBlob,
    AppendBlob,
    Unknown(String),
}

impl BlobType {
    pub fn parse(name: &str) -> Self {
        match name {
            "BlockBlob" => Self::BlockBlob,
            "PageBlob" => Self::PageBlob,
            "AppendBlob" => Self::AppendBlob,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::BlockBlob => "BlockBlob",
            Self::PageBlob => "PageBlob",
            Self::AppendBlob => "AppendBlob",
            Self::Unknown(name) => name,
        }
    }
}

impl Serialize for BlobType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Payload of a change event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeedEventData {
    pub api: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_type: Option<BlobType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequencer: Option<String>,
}

/// One change recorded in the feed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeedEvent {
    pub topic: String,
    pub subject: String,
    pub event_type: EventType,
    pub event_time: DateTime<Utc>,
    pub id: String,
    pub data: ChangeFeedEventData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,
}

impl ChangeFeedEvent {
    /// Adapt one decoded record; the error is a human-readable reason
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let record = value
            .as_record()
            .ok_or_else(|| format!("expected a record, found {}", value.kind()))?;

        let event_time = required_str(record, "eventTime")?;
        let event_time = DateTime::parse_from_rfc3339(&event_time)
            .map_err(|e| format!("eventTime '{}' is not RFC 3339: {}", event_time, e))?
            .with_timezone(&Utc);

        let data = match record.get("data") {
            Some(Value::Record(data)) => ChangeFeedEventData::from_record(data)?,
            Some(other) => return Err(format!("field 'data' is {}, expected record", other.kind())),
            None => return Err("missing field 'data'".to_string()),
        };

        Ok(Self {
            topic: required_str(record, "topic")?,
            subject: required_str(record, "subject")?,
            event_type: EventType::parse(&required_str(record, "eventType")?),
            event_time,
            id: required_str(record, "id")?,
            data,
            data_version: optional_str(record, "dataVersion")?,
            metadata_version: optional_str(record, "metadataVersion")?,
            schema_version: optional_long(record, "schemaVersion")?,
        })
    }
}

impl ChangeFeedEventData {
    fn from_record(record: &Record) -> std::result::Result<Self, String> {
        Ok(Self {
            api: required_str(record, "api")?,
            client_request_id: optional_str(record, "clientRequestId")?,
            request_id: optional_str(record, "requestId")?,
            etag: optional_str(record, "etag")?,
            content_type: optional_str(record, "contentType")?,
            content_length: optional_long(record, "contentLength")?,
            blob_type: optional_str(record, "blobType")?.map(|name| BlobType::parse(&name)),
            content_offset: optional_long(record, "contentOffset")?,
            destination_url: optional_str(record, "destinationUrl")?,
            source_url: optional_str(record, "sourceUrl")?,
            url: optional_str(record, "url")?,
            recursive: optional_bool(record, "recursive")?,
            sequencer: optional_str(record, "sequencer")?,
        })
    }
}

/// A present, non-null field
fn field<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|value| !value.is_null())
}

fn required_str(record: &Record, name: &str) -> std::result::Result<String, String> {
    optional_str(record, name)?.ok_or_else(|| format!("missing field '{}'", name))
}

fn optional_str(record: &Record, name: &str) -> std::result::Result<Option<String>, String> {
    match field(record, name) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| wrong_type(name, value, "string")),
    }
}

fn optional_long(record: &Record, name: &str) -> std::result::Result<Option<i64>, String> {
    match field(record, name) {
        None => Ok(None),
        Some(value) => value
            .as_long()
            .map(Some)
            .ok_or_else(|| wrong_type(name, value, "long")),
    }
}

fn optional_bool(record: &Record, name: &str) -> std::result::Result<Option<bool>, String> {
    match field(record, name) {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        // Some producers write this flag as a string
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(value) => Err(wrong_type(name, value, "boolean")),
    }
}

fn wrong_type(name: &str, value: &Value, expected: &str) -> String {
    format!("field '{}' is {}, expected {}", name, value.kind(), expected)
}
