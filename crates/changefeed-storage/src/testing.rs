//! Fixtures that lay out a change feed in an object store
//!
//! Only compiled for this crate's tests or with the `test-util` feature. Paths follow
//! the producer's naming:
//!
//! ```text
//! meta/segments.json
//! idx/segments/2024/05/01/1000/meta.json        segment manifest
//! log/00/2024/05/01/1000/00000.avro             shard 0, chunk 0
//! log/01/2024/05/01/1000/00000.avro             shard 1, chunk 0
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use changefeed_core::testing::{ContainerBuilder, DatumWriter};

use crate::error::{Error, Result};
use crate::store::{LogClient, LogStore, ObjectStoreLog};

pub const TEST_URL: &str = "memory://account/$blobchangefeed";
pub const CONTAINER: &str = "$blobchangefeed";

/// Event schema as written by the producer
pub const EVENT_SCHEMA: &str = r#"{
    "type": "record",
    "name": "BlobChangeEvent",
    "namespace": "com.changefeed",
    "fields": [
        {"name": "schemaVersion", "type": "int"},
        {"name": "topic", "type": "string"},
        {"name": "subject", "type": "string"},
        {"name": "eventType", "type": {"type": "enum", "name": "BlobChangeEventType",
            "symbols": ["BlobCreated", "BlobDeleted", "BlobPropertiesUpdated",
                        "BlobSnapshotCreated", "Control"]}},
        {"name": "eventTime", "type": "string"},
        {"name": "id", "type": "string"},
        {"name": "data", "type": {"type": "record", "name": "BlobChangeEventData", "fields": [
            {"name": "api", "type": "string"},
            {"name": "clientRequestId", "type": ["null", "string"]},
            {"name": "requestId", "type": ["null", "string"]},
            {"name": "etag", "type": ["null", "string"]},
            {"name": "contentType", "type": ["null", "string"]},
            {"name": "contentLength", "type": ["null", "long"]},
            {"name": "blobType", "type": ["null", {"type": "enum", "name": "BlobType",
                "symbols": ["BlockBlob", "PageBlob", "AppendBlob"]}]},
            {"name": "url", "type": ["null", "string"]},
            {"name": "sequencer", "type": ["null", "string"]},
            {"name": "storageDiagnostics", "type": {"type": "map", "values": "string"}}
        ]}},
        {"name": "dataVersion", "type": ["null", "string"]},
        {"name": "metadataVersion", "type": "string"}
    ]
}"#;

/// Top of the given UTC hour
pub fn hour(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

fn time_path(time: DateTime<Utc>) -> String {
    time.format("%Y/%m/%d/%H%M").to_string()
}

pub fn segment_path(time: DateTime<Utc>) -> String {
    format!("idx/segments/{}/meta.json", time_path(time))
}

pub fn shard_prefix(shard: usize, time: DateTime<Utc>) -> String {
    format!("log/{:02}/{}/", shard, time_path(time))
}

pub fn chunk_path(shard: usize, time: DateTime<Utc>, chunk: usize) -> String {
    format!("{}{:05}.avro", shard_prefix(shard, time), chunk)
}

/// One `BlobCreated` event; the id doubles as the blob name
pub fn encode_event(id: &str) -> Vec<u8> {
    DatumWriter::new()
        .int(5)
        .string("/subscriptions/test/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/account")
        .string(&format!("/blobServices/default/containers/test/blobs/{}", id))
        .long(0)
        .string("2024-05-01T10:00:00.0000000Z")
        .string(id)
        // data
        .string("PutBlob")
        .union_index(1)
        .string("client-request")
        .union_index(1)
        .string("request")
        .union_index(1)
        .string("0x8DC0000000000")
        .union_index(1)
        .string("application/octet-stream")
        .union_index(1)
        .long(id.len() as i64)
        .union_index(1)
        .long(0)
        .union_index(0)
        .union_index(1)
        .string("00000000000000000000000000000001")
        .long(1)
        .string("bid")
        .string("diag")
        .long(0)
        // dataVersion, metadataVersion
        .union_index(0)
        .string("1")
        .finish()
}

/// A chunk file holding `ids`, two events per block
pub fn chunk_file(ids: &[&str]) -> Vec<u8> {
    let mut builder = ContainerBuilder::new(EVENT_SCHEMA).codec("null");
    for pair in ids.chunks(2) {
        builder = builder.block(pair.iter().map(|id| encode_event(id)).collect());
    }
    builder.build()
}

/// Writes feed objects into a store
pub struct FeedFixture {
    store: Arc<dyn ObjectStore>,
    url: String,
}

impl Default for FeedFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedFixture {
    /// A feed in a fresh in-memory store
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemory::new()), TEST_URL)
    }

    pub fn with_store(store: Arc<dyn ObjectStore>, url: impl Into<String>) -> Self {
        Self {
            store,
            url: url.into(),
        }
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn log_store(&self) -> Arc<dyn LogStore> {
        Arc::new(ObjectStoreLog::new(self.store.clone(), self.url.clone()))
    }

    pub fn client(&self) -> LogClient {
        LogClient::new(self.log_store(), None)
    }

    /// A store over this feed whose downloads of `path` fail `failures` times
    pub fn flaky_store(&self, path: &str, failures: usize) -> Arc<dyn LogStore> {
        Arc::new(FlakyStore::new(self.log_store(), path, failures))
    }

    pub async fn put_raw(&self, path: &str, data: Vec<u8>) {
        self.store
            .put(&Path::from(path), Bytes::from(data).into())
            .await
            .unwrap_or_else(|e| panic!("failed to write {}: {}", path, e));
    }

    pub async fn put_chunk(&self, path: &str, ids: &[&str]) {
        self.put_raw(path, chunk_file(ids)).await;
    }

    pub async fn put_meta(&self, last_consumable: DateTime<Utc>) {
        let meta = json!({
            "version": 0,
            "lastConsumable": last_consumable.to_rfc3339(),
            "storageDiagnostics": {"version": 0, "data": {"aid": "fixture"}}
        });
        self.put_raw("meta/segments.json", meta.to_string().into_bytes())
            .await;
    }

    /// Write a segment manifest and its chunks; `shards[s][c]` are the event ids of
    /// chunk `c` in shard `s`
    pub async fn put_segment(
        &self,
        time: DateTime<Utc>,
        finalized: bool,
        shards: Vec<Vec<Vec<&str>>>,
    ) -> String {
        let prefixes: Vec<String> = (0..shards.len())
            .map(|shard| format!("{}/{}", CONTAINER, shard_prefix(shard, time)))
            .collect();
        let manifest = json!({
            "version": 0,
            "begin": time.to_rfc3339(),
            "intervalSecs": 3600,
            "status": if finalized { "Finalized" } else { "Publishing" },
            "config": {"version": 0, "configVersionEtag": "0x0"},
            "chunkFilePaths": prefixes,
        });

        let path = segment_path(time);
        self.put_raw(&path, manifest.to_string().into_bytes()).await;

        for (shard, chunks) in shards.iter().enumerate() {
            for (chunk, ids) in chunks.iter().enumerate() {
                self.put_chunk(&chunk_path(shard, time, chunk), ids).await;
            }
        }
        path
    }
}

/// Fails downloads of one path a set number of times, then passes them through
pub struct FlakyStore {
    inner: Arc<dyn LogStore>,
    path: String,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn LogStore>, path: impl Into<String>, failures: usize) -> Self {
        Self {
            inner,
            path: path.into(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl LogStore for FlakyStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_objects(prefix).await
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let fail = path == self.path
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
        if fail {
            return Err(Error::ObjectStore(object_store::Error::Generic {
                store: "flaky",
                source: format!("transient failure reading {}", path).into(),
            }));
        }
        self.inner.download(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path).await
    }

    fn url(&self) -> &str {
        self.inner.url()
    }
}
