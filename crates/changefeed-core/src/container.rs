//! Container File Reader
//!
//! This module implements `ContainerFileReader`, which walks the framing of a
//! self-describing container file and hands back one decoded item at a time.
//!
//! ## File Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Magic: 'O' 'b' 'j' 0x01 (4 bytes)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Metadata: map<string, bytes> as blocks                      │
//! │ - "avro.schema": schema JSON text (required)                │
//! │ - "avro.codec":  "null" or absent (anything else rejected)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Sync marker (16 bytes)                                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Data block 1                                                │
//! │ - Item count (varint; negative → byte length follows)       │
//! │ - Items                                                     │
//! │ - Copy of the sync marker (16 bytes)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Data block 2 ...                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## States
//!
//! ```text
//! Unopened ──open()──▶ Ready(items left in block) ──last item──▶ Exhausted
//!    │                     ▲                │
//!    │                     └─ next block ◀──┘
//!    │                     │
//!    └──── any error ──────┴──▶ Failed
//! ```
//!
//! - `open()` validates the magic, reads the metadata, checks the codec, reads the
//!   sync marker, compiles the schema and reads the first block count.
//! - `next()` decodes one item. When a block runs out, the trailing sync marker must
//!   equal the header's (otherwise `CorruptContainerFile`), then the next block
//!   count is read. Running out of input exactly there is the normal end of file.
//! - Any error leaves the input at an unknown offset inside the file, so the reader
//!   moves to `Failed` and every later call returns `ReaderFailed`.
//!
//! ## Error Handling
//!
//! - `NotAContainerFile`: bad magic bytes
//! - `UnsupportedCodec`: compressed data
//! - `MissingMetadata`: no embedded schema
//! - `CorruptContainerFile`: sync marker mismatch, never resynchronized
//! - `UnexpectedEndOfInput`: the file was cut short inside a block
//!
//! ## Thread Safety
//!
//! The reader holds its input position and is not meant to be shared; one reader per
//! file, driven by one consumer.

use bytes::{Buf, Bytes};
use std::collections::HashMap;

use crate::decoder::{BinaryDecoder, SYNC_MARKER_LEN};
use crate::record_decoder::RecordDecoder;
use crate::schema::Schema;
use crate::value::Value;
use crate::{Error, Result};

/// Magic bytes at the start of every container file
pub const MAGIC: [u8; 4] = [b'O', b'b', b'j', 0x01];

/// Metadata key holding the schema text
pub const SCHEMA_KEY: &str = "avro.schema";

/// Metadata key holding the codec name
pub const CODEC_KEY: &str = "avro.codec";

/// The only codec this reader decodes
pub const NULL_CODEC: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unopened,
    Ready { remaining: u64 },
    Exhausted,
    Failed { offset: u64 },
}

/// Everything learned from the file header
#[derive(Debug)]
pub struct Header {
    metadata: HashMap<String, Bytes>,
    sync_marker: [u8; SYNC_MARKER_LEN],
    schema: Schema,
}

impl Header {
    pub fn metadata(&self) -> &HashMap<String, Bytes> {
        &self.metadata
    }

    pub fn sync_marker(&self) -> &[u8; SYNC_MARKER_LEN] {
        &self.sync_marker
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Reads decoded items from one container file
pub struct ContainerFileReader<B> {
    input: BinaryDecoder<B>,
    state: State,
    header: Option<Header>,
    decoder: Option<RecordDecoder>,
    items_read: u64,
}

impl<B: Buf> ContainerFileReader<B> {
    /// Wrap a container file; nothing is read until `open` or `next`
    pub fn new(data: B) -> Self {
        Self {
            input: BinaryDecoder::new(data),
            state: State::Unopened,
            header: None,
            decoder: None,
            items_read: 0,
        }
    }

    /// Parse the header and position the reader at the first item
    ///
    /// Calling `open` on an already opened reader does nothing.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            State::Unopened => {}
            State::Failed { offset } => return Err(Error::ReaderFailed { offset }),
            State::Ready { .. } | State::Exhausted => return Ok(()),
        }

        let result = self.read_header();
        self.fail_on_error(result)
    }

    fn read_header(&mut self) -> Result<()> {
        let magic = self
            .input
            .read_fixed(MAGIC.len())
            .map_err(|_| Error::NotAContainerFile)?;
        if magic.as_ref() != MAGIC {
            return Err(Error::NotAContainerFile);
        }

        let metadata = self.read_metadata()?;

        if let Some(codec) = metadata.get(CODEC_KEY) {
            if codec.as_ref() != NULL_CODEC.as_bytes() {
                return Err(Error::UnsupportedCodec(
                    String::from_utf8_lossy(codec).into_owned(),
                ));
            }
        }

        let sync_marker = self.input.read_sync_marker()?;

        let schema_text = metadata
            .get(SCHEMA_KEY)
            .ok_or(Error::MissingMetadata(SCHEMA_KEY))?;
        let schema_text = std::str::from_utf8(schema_text)
            .map_err(|_| Error::InvalidSchema("schema text is not UTF-8".to_string()))?;
        let schema = Schema::parse_str(schema_text)?;

        self.decoder = Some(RecordDecoder::new(&schema));
        self.header = Some(Header {
            metadata,
            sync_marker,
            schema,
        });

        self.state = self.read_next_block()?;

        tracing::trace!(
            header_bytes = self.input.position(),
            state = ?self.state,
            "Opened container file"
        );

        Ok(())
    }

    /// Whether another item may be available
    ///
    /// An unopened reader reports `true`; open it to get a definitive answer.
    pub fn has_next(&self) -> bool {
        match self.state {
            State::Unopened => true,
            State::Ready { remaining } => remaining > 0,
            State::Exhausted | State::Failed { .. } => false,
        }
    }

    /// Offset of the error that stopped this reader, if one did
    pub fn failed_at(&self) -> Option<u64> {
        match self.state {
            State::Failed { offset } => Some(offset),
            _ => None,
        }
    }

    /// Whether the last block has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Decode the next item, opening the file first if needed
    ///
    /// Returns `None` once the file is exhausted. After an error every call fails
    /// with `ReaderFailed`.
    pub fn next_item(&mut self) -> Result<Option<Value>> {
        self.open()?;

        let remaining = match self.state {
            State::Ready { remaining } => remaining,
            State::Failed { offset } => return Err(Error::ReaderFailed { offset }),
            State::Exhausted | State::Unopened => return Ok(None),
        };

        let result = self.read_item(remaining);
        self.fail_on_error(result)
    }

    fn read_item(&mut self, remaining: u64) -> Result<Option<Value>> {
        let decoder = match self.decoder.as_ref() {
            Some(decoder) => decoder,
            None => return Ok(None),
        };
        let value = decoder.decode(&mut self.input)?;
        self.items_read += 1;

        self.state = if remaining > 1 {
            State::Ready {
                remaining: remaining - 1,
            }
        } else {
            self.verify_sync_marker()?;
            self.read_next_block()?
        };

        Ok(Some(value))
    }

    /// Header of an opened file
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Number of items decoded so far
    pub fn items_read(&self) -> u64 {
        self.items_read
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.input.position()
    }

    fn fail_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = State::Failed {
                offset: self.input.position(),
            };
        }
        result
    }

    fn read_metadata(&mut self) -> Result<HashMap<String, Bytes>> {
        let mut metadata = HashMap::new();
        loop {
            // A key length and a value length at least
            let count = self
                .input
                .read_bounded_block_count(2, metadata.len() as u64)?;
            if count == 0 {
                return Ok(metadata);
            }
            for _ in 0..count {
                let key = self.input.read_string()?;
                let value = self.input.read_bytes()?;
                metadata.insert(key, value);
            }
        }
    }

    fn read_next_block(&mut self) -> Result<State> {
        let item_width = self.decoder.as_ref().map_or(0, RecordDecoder::item_width);
        Ok(match self.input.try_read_bounded_block_count(item_width, 0)? {
            None | Some(0) => State::Exhausted,
            Some(remaining) => State::Ready { remaining },
        })
    }

    fn verify_sync_marker(&mut self) -> Result<()> {
        let offset = self.input.position();
        let marker = self.input.read_sync_marker()?;
        let expected = self.header.as_ref().map(|h| h.sync_marker);
        if expected != Some(marker) {
            return Err(Error::CorruptContainerFile { offset });
        }
        Ok(())
    }
}

impl<B: Buf> Iterator for ContainerFileReader<B> {
    type Item = Result<Value>;

    /// Yields the error that stopped the reader once, then ends
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed_at().is_some() {
            return None;
        }
        self.next_item().transpose()
    }
}
