//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::{ContentStoreError, Result};
use crate::reference::StorageRef;

/// Stream of content chunks as read from the backend.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Configuration for the object storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// Size and modification time of a stored blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Handle to the configured backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ContentStore {
    inner: Arc<dyn ObjectStore>,
}

impl ContentStore {
    /// Create a new content store from configuration.
    pub async fn new(config: ContentStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            ContentStoreConfig::Memory => Arc::new(InMemory::new()),

            ContentStoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| ContentStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ContentStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| ContentStoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket doesn't exist
                let prefix = ObjectPath::from("");
                let mut stream = store.list(Some(&prefix));
                match stream.try_next().await {
                    Ok(_) => {}
                    Err(object_store::Error::NotFound { .. }) => {
                        return Err(ContentStoreError::BucketNotFound(bucket.clone()));
                    }
                    Err(e) => {
                        let msg = e.to_string();
                        if msg.contains("NoSuchBucket") {
                            return Err(ContentStoreError::BucketNotFound(bucket.clone()));
                        }
                        return Err(e.into());
                    }
                }
                drop(stream);

                store
            }
        };

        tracing::info!(backend = %inner, "content store ready");
        Ok(Self { inner })
    }

    /// Create an in-memory content store.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    /// Build the object path for a storage reference.
    fn content_path(storage_ref: &StorageRef) -> ObjectPath {
        ObjectPath::from(format!("content/{}", storage_ref))
    }

    fn not_found(storage_ref: &StorageRef, err: object_store::Error) -> ContentStoreError {
        match err {
            object_store::Error::NotFound { .. } => ContentStoreError::NotFound(storage_ref.clone()),
            e => e.into(),
        }
    }

    /// Create or overwrite the blob under `storage_ref`.
    pub async fn write(&self, storage_ref: &StorageRef, data: Bytes) -> Result<()> {
        let path = Self::content_path(storage_ref);
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    /// Open the blob for streaming reads.
    pub async fn open(&self, storage_ref: &StorageRef) -> Result<ByteStream> {
        let path = Self::content_path(storage_ref);
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| Self::not_found(storage_ref, e))?;
        Ok(result.into_stream().map_err(ContentStoreError::from).boxed())
    }

    /// Read the whole blob into memory.
    pub async fn read(&self, storage_ref: &StorageRef) -> Result<Bytes> {
        let path = Self::content_path(storage_ref);
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| Self::not_found(storage_ref, e))?;
        Ok(result.bytes().await?)
    }

    /// Size and modification time of the blob.
    pub async fn stat(&self, storage_ref: &StorageRef) -> Result<ObjectStat> {
        let path = Self::content_path(storage_ref);
        let meta = self
            .inner
            .head(&path)
            .await
            .map_err(|e| Self::not_found(storage_ref, e))?;
        Ok(ObjectStat {
            size: meta.size as u64,
            last_modified: meta.last_modified,
        })
    }

    /// Remove the blob. Removing a missing blob is not an error.
    pub async fn remove(&self, storage_ref: &StorageRef) -> Result<()> {
        let path = Self::content_path(storage_ref);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Round-trip to the backend to check it is answering.
    pub async fn ping(&self) -> Result<()> {
        let prefix = ObjectPath::from("content/");
        let mut stream = self.inner.list(Some(&prefix));
        stream.try_next().await?;
        Ok(())
    }

    /// List every storage reference currently holding content.
    pub async fn list(&self) -> Result<Vec<StorageRef>> {
        let prefix = ObjectPath::from("content/");
        let items: Vec<_> = self.inner.list(Some(&prefix)).try_collect().await?;

        let refs = items
            .into_iter()
            .filter_map(|meta| {
                meta.location
                    .as_ref()
                    .strip_prefix("content/")
                    .map(|s| StorageRef::from(s.to_string()))
            })
            .collect();

        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = ContentStore::memory();

        let storage_ref = StorageRef::generate();
        let data = Bytes::from("hello world");

        store.write(&storage_ref, data.clone()).await.unwrap();
        let retrieved = store.read(&storage_ref).await.unwrap();
        assert_eq!(retrieved, data);

        let stat = store.stat(&storage_ref).await.unwrap();
        assert_eq!(stat.size, 11);

        let refs = store.list().await.unwrap();
        assert_eq!(refs, vec![storage_ref.clone()]);

        store.remove(&storage_ref).await.unwrap();
        assert!(matches!(
            store.stat(&storage_ref).await,
            Err(ContentStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_streams_all_chunks() {
        let store = ContentStore::memory();
        let storage_ref = StorageRef::generate();
        store
            .write(&storage_ref, Bytes::from_static(b"streamed content"))
            .await
            .unwrap();

        let chunks: Vec<Bytes> = store
            .open(&storage_ref)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        assert_eq!(joined, b"streamed content");
    }

    #[tokio::test]
    async fn test_missing_content() {
        let store = ContentStore::memory();
        let storage_ref = StorageRef::generate();

        assert!(matches!(
            store.read(&storage_ref).await,
            Err(ContentStoreError::NotFound(r)) if r == storage_ref
        ));
        assert!(store.open(&storage_ref).await.is_err());
        // Removing twice is fine
        store.remove(&storage_ref).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ContentStoreConfig::Local {
            path: temp_dir.path().to_path_buf(),
        };

        let store = ContentStore::new(config).await.unwrap();
        store.ping().await.unwrap();

        let storage_ref = StorageRef::generate();
        let data = Bytes::from("test data");

        store.write(&storage_ref, data.clone()).await.unwrap();
        let retrieved = store.read(&storage_ref).await.unwrap();
        assert_eq!(retrieved, data);

        // Verify file exists on disk
        let file_path = temp_dir.path().join("content").join(storage_ref.as_str());
        assert!(file_path.exists());
    }
}
