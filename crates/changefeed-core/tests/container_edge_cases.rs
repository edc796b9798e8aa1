//! Edge cases for reading whole container files through the public API

use bytes::{Buf, Bytes};
use changefeed_core::testing::{ContainerBuilder, DatumWriter};
use changefeed_core::{ContainerFileReader, Error, Result, Value};

const EVENT_SCHEMA: &str = r#"{
    "type": "record",
    "name": "Event",
    "namespace": "feed",
    "fields": [
        {"name": "id", "type": "string"},
        {"name": "eventTime", "type": "string"},
        {"name": "tag", "type": ["null", "string"]},
        {"name": "sizes", "type": {"type": "array", "items": "long"}}
    ]
}"#;

fn event(id: &str, tag: Option<&str>, sizes: &[i64]) -> Vec<u8> {
    let mut writer = DatumWriter::new()
        .string(id)
        .string("2024-05-01T10:00:00Z");
    writer = match tag {
        Some(tag) => writer.union_index(1).string(tag),
        None => writer.union_index(0),
    };
    if !sizes.is_empty() {
        writer = writer.long(sizes.len() as i64);
        for size in sizes {
            writer = writer.long(*size);
        }
    }
    writer.long(0).finish()
}

fn read_all(data: impl Buf) -> Result<Vec<Value>> {
    ContainerFileReader::new(data).collect()
}

#[test]
fn test_records_decode_across_mixed_blocks() {
    let file = ContainerBuilder::new(EVENT_SCHEMA)
        .block(vec![
            event("a", None, &[]),
            event("b", Some("x"), &[1, 2]),
            event("c", None, &[3]),
        ])
        .negative_block(vec![event("d", Some("y"), &[]), event("e", None, &[4, 5, 6])])
        .build();

    let values = read_all(Bytes::from(file)).unwrap();
    assert_eq!(values.len(), 5);

    let ids: Vec<&str> = values
        .iter()
        .map(|v| v.as_record().unwrap().get("id").unwrap().as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);

    let b = values[1].as_record().unwrap();
    assert_eq!(b.name(), "Event");
    assert_eq!(b.get("tag").unwrap().as_str(), Some("x"));
    assert_eq!(
        b.get("sizes").unwrap().as_array().unwrap(),
        &[Value::Long(1), Value::Long(2)]
    );

    let a = values[0].as_record().unwrap();
    assert!(a.get("tag").unwrap().is_null());
}

#[test]
fn test_file_with_no_blocks_is_empty() {
    let file = ContainerBuilder::new(EVENT_SCHEMA).build();
    assert!(read_all(Bytes::from(file)).unwrap().is_empty());
}

#[test]
fn test_explicit_terminator_block_ends_file() {
    let mut file = ContainerBuilder::new(r#""int""#)
        .block(vec![DatumWriter::new().int(7).finish()])
        .build();
    // A zero count after the last block
    file.push(0);

    let values = read_all(Bytes::from(file)).unwrap();
    assert_eq!(values, vec![Value::Int(7)]);
}

#[test]
fn test_reader_over_chained_buffers() {
    let file = ContainerBuilder::new(EVENT_SCHEMA)
        .block(vec![event("a", Some("tag"), &[1]), event("b", None, &[])])
        .build();

    // Split at an arbitrary point so items straddle the two chunks
    let split = file.len() / 2 + 3;
    let (head, tail) = file.split_at(split);
    let chained = Bytes::copy_from_slice(head).chain(Bytes::copy_from_slice(tail));

    let values = read_all(chained).unwrap();
    assert_eq!(values, read_all(Bytes::from(file)).unwrap());
}

#[test]
fn test_corruption_is_not_resynchronized() {
    let builder = ContainerBuilder::new(r#""long""#)
        .block(vec![DatumWriter::new().long(1).finish()])
        .block(vec![DatumWriter::new().long(2).finish()]);
    let mut file = builder.build();
    let first_copy = file.len() - 16 - 2 - 16;
    file[first_copy] ^= 0x01;

    let mut reader = ContainerFileReader::new(Bytes::from(file));
    assert!(matches!(
        reader.next_item(),
        Err(Error::CorruptContainerFile { .. })
    ));
}

#[test]
fn test_unsupported_schema_feature_surfaces_on_open() {
    let schema = r#"{"type": "record", "name": "R", "fields": [
        {"name": "f", "type": {"type": "fixed", "name": "F", "size": 4}}
    ]}"#;
    let file = ContainerBuilder::new(schema).build();

    let mut reader = ContainerFileReader::new(Bytes::from(file));
    assert!(matches!(
        reader.open(),
        Err(Error::UnsupportedSchemaFeature(_))
    ));
}

#[test]
fn test_malformed_schema_text() {
    let file = ContainerBuilder::new("{not json").build();
    assert!(matches!(
        read_all(Bytes::from(file)),
        Err(Error::InvalidSchema(_))
    ));
}

#[test]
fn test_null_codec_is_accepted() {
    let file = ContainerBuilder::new(r#""string""#)
        .codec("null")
        .block(vec![DatumWriter::new().string("ok").finish()])
        .build();
    assert_eq!(
        read_all(Bytes::from(file)).unwrap(),
        vec![Value::String("ok".to_string())]
    );
}
