//! Fixture writers for tests, benches and fuzz corpora
//!
//! Only compiled for this crate's tests or with the `test-util` feature. The change
//! feed reader never writes container files; these helpers exist so tests can build
//! byte-exact inputs, including shapes a well-behaved producer would never emit
//! (negative block counts, corrupted sync markers, truncated blocks).

use bytes::{BufMut, BytesMut};

use crate::container::{CODEC_KEY, MAGIC, SCHEMA_KEY};
use crate::decoder::SYNC_MARKER_LEN;
use crate::varint::encode_varint;

/// Encodes primitive values back to back
#[derive(Default)]
pub struct DatumWriter {
    buf: BytesMut,
}

impl DatumWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn long(mut self, value: i64) -> Self {
        encode_varint(&mut self.buf, value);
        self
    }

    pub fn int(self, value: i32) -> Self {
        self.long(value as i64)
    }

    pub fn union_index(self, index: i64) -> Self {
        self.long(index)
    }

    pub fn boolean(mut self, value: bool) -> Self {
        self.buf.put_u8(value as u8);
        self
    }

    pub fn float(mut self, value: f32) -> Self {
        self.buf.put_f32_le(value);
        self
    }

    pub fn double(mut self, value: f64) -> Self {
        self.buf.put_f64_le(value);
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        encode_varint(&mut self.buf, value.len() as i64);
        self.buf.put_slice(value);
        self
    }

    pub fn string(self, value: &str) -> Self {
        self.bytes(value.as_bytes())
    }

    /// Append already-encoded bytes
    pub fn raw(mut self, value: &[u8]) -> Self {
        self.buf.put_slice(value);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

struct Block {
    items: Vec<Vec<u8>>,
    negative_count: bool,
}

/// Builds a complete container file
pub struct ContainerBuilder {
    schema: String,
    codec: Option<String>,
    extra_metadata: Vec<(String, Vec<u8>)>,
    sync_marker: [u8; SYNC_MARKER_LEN],
    blocks: Vec<Block>,
}

impl ContainerBuilder {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            codec: None,
            extra_metadata: Vec::new(),
            sync_marker: *b"0123456789abcdef",
            blocks: Vec::new(),
        }
    }

    pub fn codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.extra_metadata.push((key.into(), value.into()));
        self
    }

    pub fn sync_marker(mut self, marker: [u8; SYNC_MARKER_LEN]) -> Self {
        self.sync_marker = marker;
        self
    }

    /// A data block with a positive item count
    pub fn block(mut self, items: Vec<Vec<u8>>) -> Self {
        self.blocks.push(Block {
            items,
            negative_count: false,
        });
        self
    }

    /// A data block with a negated item count followed by its byte length
    pub fn negative_block(mut self, items: Vec<Vec<u8>>) -> Self {
        self.blocks.push(Block {
            items,
            negative_count: true,
        });
        self
    }

    pub fn sync_marker_value(&self) -> [u8; SYNC_MARKER_LEN] {
        self.sync_marker
    }

    pub fn build(self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);

        let mut metadata: Vec<(String, Vec<u8>)> =
            vec![(SCHEMA_KEY.to_string(), self.schema.into_bytes())];
        if let Some(codec) = self.codec {
            metadata.push((CODEC_KEY.to_string(), codec.into_bytes()));
        }
        metadata.extend(self.extra_metadata);

        encode_varint(&mut buf, metadata.len() as i64);
        for (key, value) in &metadata {
            encode_varint(&mut buf, key.len() as i64);
            buf.put_slice(key.as_bytes());
            encode_varint(&mut buf, value.len() as i64);
            buf.put_slice(value);
        }
        encode_varint(&mut buf, 0);

        buf.put_slice(&self.sync_marker);

        for block in self.blocks {
            let count = block.items.len() as i64;
            if block.negative_count {
                let byte_len: usize = block.items.iter().map(Vec::len).sum();
                encode_varint(&mut buf, -count);
                encode_varint(&mut buf, byte_len as i64);
            } else {
                encode_varint(&mut buf, count);
            }
            for item in &block.items {
                buf.put_slice(item);
            }
            buf.put_slice(&self.sync_marker);
        }

        buf.to_vec()
    }
}
