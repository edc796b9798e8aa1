#![no_main]

use bytes::Bytes;
use changefeed_core::ContainerFileReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must produce items or an error, never a panic:
    // - Short or wrong magic
    // - Truncated metadata maps and sync markers
    // - Schemas that don't parse or name unknown types
    // - Block counts and byte sizes that overrun the input
    // - Corrupted sync markers between blocks
    let mut reader = ContainerFileReader::new(Bytes::copy_from_slice(data));
    if reader.open().is_err() {
        return;
    }

    let _ = reader.header().map(|header| header.schema().name());
    while reader.has_next() {
        match reader.next_item() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    let _ = reader.items_read();
    let _ = reader.position();
});
