//! Variable-length Integer Encoding (Varint)
//!
//! Every numeric and length-prefixed field in a container file is a zig-zag varint:
//!
//! ## Varint Encoding
//! Instead of always using 8 bytes for a u64, varints use only as many bytes as needed:
//! - Small numbers (0-127) use just 1 byte
//! - Larger numbers use 2-10 bytes depending on magnitude
//! - Each byte carries 7 bits of data (least significant group first) and 1 bit as a
//!   "continuation" flag
//!
//! ## ZigZag Encoding (for signed integers)
//! Maps signed integers to unsigned so small negative numbers are also efficient:
//! - 0 → 0, -1 → 1, 1 → 2, -2 → 3, 2 → 4, etc.
//! - Encode: `(n << 1) ^ (n >> 63)`
//! - Decode: `(-(v & 1)) ^ (v >> 1)`
//!
//! ## Errors
//! Decoding never panics. Running out of input mid-varint yields
//! `UnexpectedEndOfInput`; a tenth byte carrying more than bit 63 yields `VarintOverflow`.
//! Offsets in these errors are relative to the first byte of the varint; callers
//! that track an absolute position rebase them (see `BinaryDecoder`).
//!
//! ## Usage
//! ```ignore
//! let mut buf = BytesMut::new();
//! encode_varint(&mut buf, -42);
//! let value = decode_varint(&mut buf.as_ref())?;  // -42
//! ```

use bytes::{Buf, BufMut};

use crate::{Error, Result};

/// Maximum number of bytes a 64-bit varint can occupy
pub const MAX_VARINT_LEN: usize = 10;

/// Map a signed integer onto the unsigned zig-zag space
#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Map a zig-zag encoded value back to a signed integer
#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    (-((value & 1) as i64)) ^ ((value >> 1) & 0x7fff_ffff_ffff_ffff) as i64
}

/// Encode a signed integer as a varint (ZigZag encoding)
pub fn encode_varint(buf: &mut impl BufMut, value: i64) {
    encode_varint_u64(buf, zigzag_encode(value));
}

/// Encode an unsigned integer as a varint
pub fn encode_varint_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Decode a varint to a signed integer
pub fn decode_varint(buf: &mut impl Buf) -> Result<i64> {
    decode_varint_u64(buf).map(zigzag_decode)
}

/// Decode a varint to an unsigned integer
pub fn decode_varint_u64(buf: &mut impl Buf) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;
    let mut consumed: u64 = 0;

    loop {
        if !buf.has_remaining() {
            return Err(Error::UnexpectedEndOfInput {
                offset: consumed,
                needed: 1,
            });
        }
        let byte = buf.get_u8();
        // The 10th byte carries only bit 63 and must end the varint
        if shift == 63 && byte > 0x01 {
            return Err(Error::VarintOverflow { offset: consumed });
        }
        consumed += 1;
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(value: i64) -> (i64, usize) {
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, value);
        let len = buf.len();
        let mut cursor = buf.as_ref();
        let decoded = decode_varint(&mut cursor).unwrap();
        assert_eq!(cursor.len(), 0, "varint for {} not fully consumed", value);
        (decoded, len)
    }

    #[test]
    fn test_zigzag_boundaries_roundtrip() {
        for value in [
            0,
            -1,
            1,
            i32::MAX as i64,
            i32::MIN as i64,
            i64::MAX,
            i64::MIN,
        ] {
            assert_eq!(roundtrip(value).0, value);
        }
    }

    #[test]
    fn test_zigzag_encoding_pattern() {
        let pairs: Vec<(i64, u64)> = vec![
            (0, 0),
            (-1, 1),
            (1, 2),
            (-2, 3),
            (2, 4),
            (2147483647, 4294967294),  // i32::MAX
            (-2147483648, 4294967295), // i32::MIN
            (i64::MAX, u64::MAX - 1),
            (i64::MIN, u64::MAX),
        ];
        for (signed, unsigned) in pairs {
            assert_eq!(zigzag_encode(signed), unsigned);
            assert_eq!(zigzag_decode(unsigned), signed);
        }
    }

    #[test]
    fn test_varint_byte_counts() {
        assert_eq!(roundtrip(0).1, 1);
        assert_eq!(roundtrip(-1).1, 1);
        assert_eq!(roundtrip(63).1, 1); // zigzag 126
        assert_eq!(roundtrip(64).1, 2); // zigzag 128
        assert_eq!(roundtrip(i64::MAX).1, MAX_VARINT_LEN);
        assert_eq!(roundtrip(i64::MIN).1, MAX_VARINT_LEN);
    }

    #[test]
    fn test_low_groups_come_first() {
        // 300 = 0b10_0101100 -> [0xAC, 0x02]
        let mut cursor: &[u8] = &[0xAC, 0x02];
        assert_eq!(decode_varint_u64(&mut cursor).unwrap(), 300);
    }

    #[test]
    fn test_sequential_varints_consume_exact_bytes() {
        let mut buf = BytesMut::new();
        encode_varint(&mut buf, -100);
        encode_varint_u64(&mut buf, 200);
        encode_varint(&mut buf, 3);

        let mut cursor = buf.as_ref();
        assert_eq!(decode_varint(&mut cursor).unwrap(), -100);
        assert_eq!(decode_varint_u64(&mut cursor).unwrap(), 200);
        assert_eq!(decode_varint(&mut cursor).unwrap(), 3);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_empty_input_is_end_of_input() {
        let mut cursor: &[u8] = &[];
        match decode_varint(&mut cursor) {
            Err(Error::UnexpectedEndOfInput { offset, needed }) => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 1);
            }
            other => panic!("expected end of input, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_varint_reports_offset() {
        // Two continuation bytes and nothing after them
        let mut cursor: &[u8] = &[0x80, 0x80];
        match decode_varint_u64(&mut cursor) {
            Err(Error::UnexpectedEndOfInput { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("expected end of input, got {:?}", other),
        }
    }

    #[test]
    fn test_overlong_varint_is_rejected() {
        let bytes = [0xFFu8; 11];
        let mut cursor: &[u8] = &bytes;
        match decode_varint_u64(&mut cursor) {
            Err(Error::VarintOverflow { offset }) => assert_eq!(offset, 9),
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_tenth_byte_holds_only_bit_63() {
        let mut bytes = [0xFFu8; 10];
        bytes[9] = 0x01;
        let mut cursor: &[u8] = &bytes;
        assert_eq!(decode_varint_u64(&mut cursor).unwrap(), u64::MAX);

        // 0x02 would set bit 64
        bytes[9] = 0x02;
        let mut cursor: &[u8] = &bytes;
        assert!(matches!(
            decode_varint_u64(&mut cursor),
            Err(Error::VarintOverflow { offset: 9 })
        ));
    }
}
