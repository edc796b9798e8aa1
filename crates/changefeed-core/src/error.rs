//! Error Types for Change Feed Decoding
//!
//! This module defines all error types that can occur while decoding container
//! files and the values inside them.
//!
//! ## Error Categories
//!
//! ### Framing Errors
//! - `NotAContainerFile`: File doesn't start with the magic bytes (`Obj\x01`)
//! - `CorruptContainerFile`: A block's trailing sync marker doesn't match the header's
//! - `UnsupportedCodec`: The file declares a compression codec (only `null` is decoded)
//! - `MissingMetadata`: The header metadata lacks a required entry (the schema)
//! - `ReaderFailed`: A reader that already returned an error was asked for more
//!
//! ### Schema Errors
//! - `InvalidSchema`: The embedded schema text is not a well-formed schema tree
//! - `UnsupportedSchemaFeature`: The schema uses something this decoder refuses to guess at
//!
//! ### Data Errors
//! - `UnexpectedEndOfInput`: Input ran out in the middle of a value (truncated download)
//! - `VarintOverflow`: A variable-length integer doesn't fit in 64 bits
//! - `InvalidLength`: A negative byte/string length
//! - `BlockTooLarge`: A block claims more items than the rest of the input can hold
//! - `InvalidUtf8`: A string value isn't valid UTF-8
//! - `InvalidUnionIndex` / `InvalidEnumIndex`: Decoded index outside the schema's range
//!
//! Every data error carries the byte offset (relative to the start of the input)
//! where decoding failed.
//!
//! ## Usage
//! All decoding functions return `Result<T>` which is aliased to `Result<T, Error>`.
//!
//! ## Example
//! ```ignore
//! use changefeed_core::{Error, Result};
//!
//! fn check_magic(data: &[u8]) -> Result<()> {
//!     if data.get(..4) != Some(b"Obj\x01") {
//!         return Err(Error::NotAContainerFile);
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not a container file: bad magic bytes")]
    NotAContainerFile,

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Corrupt container file: sync marker mismatch at byte {offset}")]
    CorruptContainerFile { offset: u64 },

    #[error("Missing metadata entry: {0}")]
    MissingMetadata(&'static str),

    #[error("Container reader stopped after an earlier error at byte {offset}")]
    ReaderFailed { offset: u64 },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unsupported schema feature: {0}")]
    UnsupportedSchemaFeature(String),

    #[error("Unexpected end of input at byte {offset} ({needed} more bytes needed)")]
    UnexpectedEndOfInput { offset: u64, needed: usize },

    #[error("Varint too large at byte {offset}")]
    VarintOverflow { offset: u64 },

    #[error("Invalid length {length} at byte {offset}")]
    InvalidLength { length: i64, offset: u64 },

    #[error("Block of {count} items at byte {offset} cannot fit in the remaining input")]
    BlockTooLarge { count: u64, offset: u64 },

    #[error("Invalid UTF-8 string at byte {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error("Invalid union index {index} (union has {branches} branches)")]
    InvalidUnionIndex { index: i64, branches: usize },

    #[error("Invalid enum index {index} (enum has {symbols} symbols)")]
    InvalidEnumIndex { index: i64, symbols: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
