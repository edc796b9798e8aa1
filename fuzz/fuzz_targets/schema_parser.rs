#![no_main]

use bytes::Bytes;
use changefeed_core::{BinaryDecoder, RecordDecoder, Schema};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First line is a schema, the rest is one encoded item
    let split = data.iter().position(|&b| b == b'\n').unwrap_or(data.len());
    let Ok(text) = std::str::from_utf8(&data[..split]) else {
        return;
    };
    let Ok(schema) = Schema::parse_str(text) else {
        return;
    };

    let decoder = RecordDecoder::new(&schema);
    let rest = data.get(split + 1..).unwrap_or_default();
    let mut input = BinaryDecoder::new(Bytes::copy_from_slice(rest));
    let _ = decoder.decode(&mut input);
});
