//! Primitive Decoder
//!
//! `BinaryDecoder` reads the primitive encodings of the container format from any
//! `bytes::Buf`, tracking the absolute byte position so every error can say where
//! decoding stopped.
//!
//! ## Encodings
//!
//! | Type      | Encoding                                           |
//! |-----------|----------------------------------------------------|
//! | `null`    | zero bytes                                         |
//! | `boolean` | one byte, `0` is false                             |
//! | `int`     | zig-zag varint, narrowed to 32 bits                |
//! | `long`    | zig-zag varint                                     |
//! | `float`   | 4 bytes, little-endian IEEE 754                    |
//! | `double`  | 8 bytes, little-endian IEEE 754                    |
//! | `bytes`   | `long` length, then that many raw bytes            |
//! | `string`  | `bytes`, interpreted as UTF-8                      |
//!
//! ## Blocks
//!
//! Arrays, maps, the header metadata and the data section are all sequences of
//! blocks. Each block starts with a `long` count: `0` ends the sequence, a negative
//! count means `abs(count)` items preceded by a `long` byte length that we read and
//! throw away (we always decode every item, so there's nothing to skip).
//!
//! A count is only believed if the rest of the input could hold that many items.
//! Callers pass the fewest bytes one item can take; items that take no bytes at all
//! (`null`, empty records) are capped at `MAX_ZERO_WIDTH_ITEMS` per sequence instead.
//!
//! ## No Partial Reads
//!
//! A `Buf` may hand out its contents in several chunks (e.g. a chain of buffers).
//! Fixed-length reads keep pulling chunks until the requested length is filled, and
//! only fail with `UnexpectedEndOfInput` once the source is truly exhausted.

use bytes::{Buf, Bytes, BytesMut};

use crate::{varint, Error, Result};

/// Length of a container sync marker
pub const SYNC_MARKER_LEN: usize = 16;

/// Most items of zero encoded width one block sequence may declare
pub const MAX_ZERO_WIDTH_ITEMS: u64 = 1 << 20;

/// Reads primitive values from a byte source
pub struct BinaryDecoder<B> {
    buf: B,
    position: u64,
}

impl<B: Buf> BinaryDecoder<B> {
    pub fn new(buf: B) -> Self {
        Self { buf, position: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether any input is left
    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    pub fn read_null(&mut self) -> Result<()> {
        Ok(())
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        let byte = self.read_fixed_array::<1>()?;
        Ok(byte[0] != 0)
    }

    pub fn read_int(&mut self) -> Result<i32> {
        Ok(self.read_long()? as i32)
    }

    pub fn read_long(&mut self) -> Result<i64> {
        let before = self.buf.remaining();
        let result = varint::decode_varint(&mut self.buf);
        let start = self.position;
        self.position += (before - self.buf.remaining()) as u64;

        result.map_err(|e| match e {
            Error::UnexpectedEndOfInput { offset, needed } => Error::UnexpectedEndOfInput {
                offset: start + offset,
                needed,
            },
            Error::VarintOverflow { offset } => Error::VarintOverflow {
                offset: start + offset,
            },
            other => other,
        })
    }

    /// Like `read_long`, but a clean end of input (no bytes at all) is `None`
    pub fn try_read_long(&mut self) -> Result<Option<i64>> {
        if !self.buf.has_remaining() {
            return Ok(None);
        }
        self.read_long().map(Some)
    }

    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_fixed_array::<4>()?))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_fixed_array::<8>()?))
    }

    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let offset = self.position;
        let length = self.read_long()?;
        if length < 0 {
            return Err(Error::InvalidLength { length, offset });
        }
        self.read_fixed(length as usize)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let offset = self.position;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8 { offset })
    }

    /// Read exactly `len` raw bytes
    pub fn read_fixed(&mut self, len: usize) -> Result<Bytes> {
        // Zero-copy when the current chunk already holds everything
        if self.buf.chunk().len() >= len {
            self.position += len as u64;
            return Ok(self.buf.copy_to_bytes(len));
        }

        let mut out = BytesMut::with_capacity(len.min(self.buf.remaining()));
        while out.len() < len {
            let chunk = self.buf.chunk();
            if chunk.is_empty() {
                return Err(Error::UnexpectedEndOfInput {
                    offset: self.position,
                    needed: len - out.len(),
                });
            }
            let take = chunk.len().min(len - out.len());
            out.extend_from_slice(&chunk[..take]);
            self.buf.advance(take);
            self.position += take as u64;
        }
        Ok(out.freeze())
    }

    pub fn read_sync_marker(&mut self) -> Result<[u8; SYNC_MARKER_LEN]> {
        self.read_fixed_array::<SYNC_MARKER_LEN>()
    }

    /// Read a block header, returning the number of items in the block
    ///
    /// `0` marks the end of the block sequence.
    pub fn read_block_count(&mut self) -> Result<u64> {
        let count = self.read_long()?;
        self.finish_block_count(count)
    }

    /// Like `read_block_count`, but a clean end of input is `None`
    pub fn try_read_block_count(&mut self) -> Result<Option<u64>> {
        match self.try_read_long()? {
            Some(count) => self.finish_block_count(count).map(Some),
            None => Ok(None),
        }
    }

    /// Block count of a sequence whose items take at least `item_width` bytes each
    ///
    /// `decoded` is how many items earlier blocks of the same sequence held. Fails with
    /// `BlockTooLarge` when the block cannot be real.
    pub fn read_bounded_block_count(&mut self, item_width: usize, decoded: u64) -> Result<u64> {
        let offset = self.position;
        let count = self.read_block_count()?;
        self.check_block_fits(count, item_width, decoded, offset)
    }

    /// Like `read_bounded_block_count`, but a clean end of input is `None`
    pub fn try_read_bounded_block_count(
        &mut self,
        item_width: usize,
        decoded: u64,
    ) -> Result<Option<u64>> {
        let offset = self.position;
        match self.try_read_block_count()? {
            Some(count) => self
                .check_block_fits(count, item_width, decoded, offset)
                .map(Some),
            None => Ok(None),
        }
    }

    fn finish_block_count(&mut self, count: i64) -> Result<u64> {
        if count < 0 {
            // Byte length of the block, only useful for skipping
            self.read_long()?;
        }
        Ok(count.unsigned_abs())
    }

    fn check_block_fits(&self, count: u64, item_width: usize, decoded: u64, offset: u64) -> Result<u64> {
        let limit = match item_width {
            0 => MAX_ZERO_WIDTH_ITEMS.saturating_sub(decoded),
            width => (self.buf.remaining() / width) as u64,
        };
        if count > limit {
            return Err(Error::BlockTooLarge { count, offset });
        }
        Ok(count)
    }

    fn read_fixed_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_fixed(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}
