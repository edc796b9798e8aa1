//! Container Decode Benchmarks
//!
//! Measures how fast `ContainerFileReader` turns a change feed chunk into `Value`s.
//!
//! ## What We Benchmark
//!
//! ### 1. Item Throughput (`bench_container_read`)
//! - Decodes whole files of change events (100, 1K, 10K items)
//! - Compares one big block against many small blocks (more sync marker checks)
//!
//! ### 2. Schema Compilation (`bench_schema_compile`)
//! - Parses the event schema and compiles a `RecordDecoder`
//! - Paid once per chunk, so it should stay well below a single chunk's decode time
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench -p changefeed-core --bench container_bench
//! ```

use bytes::Bytes;
use changefeed_core::testing::{ContainerBuilder, DatumWriter};
use changefeed_core::{ContainerFileReader, RecordDecoder, Schema};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const EVENT_SCHEMA: &str = r#"{
    "type": "record",
    "name": "BlobChangeEvent",
    "fields": [
        {"name": "schemaVersion", "type": "int"},
        {"name": "topic", "type": "string"},
        {"name": "subject", "type": "string"},
        {"name": "eventType", "type": {"type": "enum", "name": "EventType",
            "symbols": ["BlobCreated", "BlobDeleted"]}},
        {"name": "eventTime", "type": "string"},
        {"name": "id", "type": "string"},
        {"name": "data", "type": {"type": "record", "name": "Data", "fields": [
            {"name": "api", "type": "string"},
            {"name": "etag", "type": ["null", "string"]},
            {"name": "contentLength", "type": ["null", "long"]}
        ]}},
        {"name": "dataVersion", "type": ["null", "string"]},
        {"name": "metadataVersion", "type": "string"}
    ]
}"#;

fn encode_event(i: u64) -> Vec<u8> {
    DatumWriter::new()
        .int(3)
        .string("/subscriptions/bench/storageAccounts/acct")
        .string(&format!("/blobServices/default/containers/c/blobs/blob-{}", i))
        .long((i % 2) as i64)
        .string("2024-05-01T10:00:00.0000000Z")
        .string(&format!("00000000-0000-0000-0000-{:012}", i))
        .string("PutBlob")
        .union_index(1)
        .string("0x8D9")
        .union_index(1)
        .long(1024 + i as i64)
        .union_index(0)
        .string("1")
        .finish()
}

fn create_file(item_count: u64, block_size: u64) -> Bytes {
    let mut builder = ContainerBuilder::new(EVENT_SCHEMA);
    let mut start = 0;
    while start < item_count {
        let end = (start + block_size).min(item_count);
        builder = builder.block((start..end).map(encode_event).collect());
        start = end;
    }
    Bytes::from(builder.build())
}

fn bench_container_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("container_read");

    for item_count in [100u64, 1000, 10_000] {
        for (label, block_size) in [("one_block", u64::MAX), ("blocks_of_16", 16)] {
            let file = create_file(item_count, block_size.min(item_count));

            group.throughput(Throughput::Elements(item_count));
            group.bench_with_input(BenchmarkId::new(label, item_count), &file, |b, file| {
                b.iter(|| {
                    let mut reader = ContainerFileReader::new(file.clone());
                    let mut count = 0;
                    while let Some(value) = reader.next_item().unwrap() {
                        black_box(value);
                        count += 1;
                    }
                    assert_eq!(count, item_count);
                });
            });
        }
    }

    group.finish();
}

fn bench_schema_compile(c: &mut Criterion) {
    c.bench_function("schema_compile", |b| {
        b.iter(|| {
            let schema = Schema::parse_str(black_box(EVENT_SCHEMA)).unwrap();
            black_box(RecordDecoder::new(&schema));
        });
    });
}

criterion_group!(benches, bench_container_read, bench_schema_compile);
criterion_main!(benches);
