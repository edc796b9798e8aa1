//! Decoding primitives for the change feed container format
//!
//! Everything in this crate works on bytes already in memory: varints, primitive
//! encodings, schemas, compiled record decoders and the container file framing.
//! Fetching files and walking the log lives in `changefeed-storage`.

pub mod container;
pub mod decoder;
pub mod error;
pub mod record_decoder;
pub mod schema;
pub mod value;
pub mod varint;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use container::{ContainerFileReader, Header};
pub use decoder::BinaryDecoder;
pub use error::{Error, Result};
pub use record_decoder::RecordDecoder;
pub use schema::{Field, Schema};
pub use value::{Record, Value};
