//! Log Store Access
//!
//! The change feed only needs three things from object storage: list objects under
//! a prefix, download a whole object, and check whether an object exists. `LogStore`
//! is that seam; `ObjectStoreLog` implements it over any `object_store::ObjectStore`
//! (S3, local filesystem, in-memory for tests).
//!
//! ## Cancellation
//!
//! Every traversal layer talks to the store through `LogClient`, which checks the
//! caller's `CancellationToken` immediately before and after each request. Decoding
//! an already-downloaded chunk is never interrupted.
//!
//! ```text
//! Chunk / Shard / Segment / ChangeFeed
//!            │
//!            ▼
//!       LogClient ── cancelled? ──▶ Error::Cancelled
//!            │
//!            ▼
//!     dyn LogStore (ObjectStoreLog → object_store)
//! ```
//!
//! ## Ordering
//!
//! `list_objects` returns paths sorted lexicographically. The producer names chunks
//! and segments so that this is chronological order.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Object storage operations the change feed depends on
#[async_trait]
pub trait LogStore: Send + Sync {
    /// All object paths under `prefix`, sorted
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// The full contents of one object
    async fn download(&self, path: &str) -> Result<Bytes>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// URL identifying this feed; cursors are bound to its hash
    fn url(&self) -> &str;
}

/// `LogStore` backed by an `object_store` implementation
pub struct ObjectStoreLog {
    store: Arc<dyn ObjectStore>,
    url: String,
}

impl ObjectStoreLog {
    pub fn new(store: Arc<dyn ObjectStore>, url: impl Into<String>) -> Self {
        Self {
            store,
            url: url.into(),
        }
    }

    /// A feed laid out under a local directory
    pub fn local(root: impl AsRef<std::path::Path>) -> Result<Self> {
        let root = root.as_ref();
        let store = object_store::local::LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(
            Arc::new(store),
            format!("file://{}", root.display()),
        ))
    }
}

#[async_trait]
impl LogStore for ObjectStoreLog {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = Path::from(prefix);
        let mut paths: Vec<String> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        paths.sort();
        Ok(paths)
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let result = self.store.get(&Path::from(path)).await?;
        Ok(result.bytes().await?)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        match self.store.head(&Path::from(path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Store handle shared by every traversal layer of one feed
#[derive(Clone)]
pub struct LogClient {
    store: Arc<dyn LogStore>,
    cancellation: CancellationToken,
}

impl LogClient {
    pub fn new(store: Arc<dyn LogStore>, cancellation: Option<CancellationToken>) -> Self {
        Self {
            store,
            cancellation: cancellation.unwrap_or_default(),
        }
    }

    pub fn url(&self) -> &str {
        self.store.url()
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_cancelled()?;
        let paths = self.store.list_objects(prefix).await?;
        self.check_cancelled()?;
        tracing::debug!(prefix = %prefix, count = paths.len(), "Listed objects");
        Ok(paths)
    }

    pub async fn download(&self, path: &str) -> Result<Bytes> {
        self.check_cancelled()?;
        let data = self.store.download(path).await?;
        self.check_cancelled()?;
        tracing::debug!(path = %path, bytes = data.len(), "Downloaded object");
        Ok(data)
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.check_cancelled()?;
        let exists = self.store.exists(path).await?;
        self.check_cancelled()?;
        Ok(exists)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    async fn store_with(paths: &[&str]) -> ObjectStoreLog {
        let inner = Arc::new(InMemory::new());
        for path in paths {
            inner
                .put(&Path::from(*path), Bytes::from(path.to_string()).into())
                .await
                .unwrap();
        }
        ObjectStoreLog::new(inner, "memory://feed")
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_scoped_to_prefix() {
        let store = store_with(&[
            "log/00/b.avro",
            "log/00/a.avro",
            "log/001/other.avro",
            "log/01/c.avro",
        ])
        .await;

        let paths = store.list_objects("log/00/").await.unwrap();
        assert_eq!(paths, vec!["log/00/a.avro", "log/00/b.avro"]);
    }

    #[tokio::test]
    async fn test_download_and_exists() {
        let store = store_with(&["meta/segments.json"]).await;

        assert!(store.exists("meta/segments.json").await.unwrap());
        assert!(!store.exists("meta/missing.json").await.unwrap());
        assert_eq!(
            store.download("meta/segments.json").await.unwrap(),
            Bytes::from("meta/segments.json")
        );
        assert!(matches!(
            store.download("meta/missing.json").await,
            Err(Error::ObjectStore(object_store::Error::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("log/00")).unwrap();
        std::fs::write(dir.path().join("log/00/00001.avro"), b"second").unwrap();
        std::fs::write(dir.path().join("log/00/00000.avro"), b"first").unwrap();

        let store = ObjectStoreLog::local(dir.path()).unwrap();
        assert!(store.url().starts_with("file://"));
        assert_eq!(
            store.list_objects("log/00/").await.unwrap(),
            vec!["log/00/00000.avro", "log/00/00001.avro"]
        );
        assert_eq!(
            store.download("log/00/00000.avro").await.unwrap(),
            Bytes::from_static(b"first")
        );
        assert!(!store.exists("log/01/00000.avro").await.unwrap());
    }

    #[test]
    fn test_missing_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ObjectStoreLog::local(dir.path().join("absent")).is_err());
    }

    #[tokio::test]
    async fn test_cancelled_client_refuses_io() {
        let store = Arc::new(store_with(&["a"]).await);
        let token = CancellationToken::new();
        let client = LogClient::new(store, Some(token.clone()));

        assert!(client.exists("a").await.unwrap());
        token.cancel();
        assert!(matches!(client.download("a").await, Err(Error::Cancelled)));
        assert!(matches!(client.list("").await, Err(Error::Cancelled)));
    }
}
