//! Storage Error Types
//!
//! This module defines all error types that can occur while walking a change feed.
//!
//! ## Error Categories
//!
//! ### Log Errors
//! - `LogNotEnabledOrProvisioning`: The feed's metadata object is missing
//! - `InvalidSegmentPath`: A segment manifest path doesn't encode a timestamp
//! - `InvalidManifest`: A manifest or the feed metadata isn't the expected JSON
//!
//! ### Decode Errors
//! - `Decode`: A chunk failed to decode (wraps the core error with the object path)
//! - `MalformedEvent`: A decoded record is missing a field or has the wrong shape
//!
//! ### Cursor Errors
//! - `InvalidCursor`: Unknown version, or positions that don't fit the log
//! - `CursorMismatch`: The cursor was taken from a different feed
//!
//! ### Object Store Errors
//! - `ObjectStore`: Low-level object store operation failed
//! - `Cancelled`: The caller's cancellation token fired at an I/O boundary
//!
//! ## Usage
//!
//! All traversal operations return `Result<T>` which is aliased to
//! `Result<T, Error>`. None of these are retried here; retry policy belongs to the
//! object store client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: changefeed_core::Error,
    },

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Change feed is not enabled or is still provisioning: {0}")]
    LogNotEnabledOrProvisioning(String),

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("Invalid segment path: {0}")]
    InvalidSegmentPath(String),

    #[error("Malformed event in {path}: {reason}")]
    MalformedEvent { path: String, reason: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Cursor belongs to a different change feed (expected {expected}, found {found})")]
    CursorMismatch { expected: String, found: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
