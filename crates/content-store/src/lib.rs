//! Content Store
//!
//! Byte-level storage for document content, addressed by an opaque
//! [`StorageRef`]. The store knows nothing about remote paths, folders or
//! versions; the node tree owns that mapping.
//!
//! # Backends
//!
//! - In-memory (tests, ephemeral servers)
//! - Local filesystem
//! - S3-compatible object storage (AWS S3, MinIO, ...)
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use content_store::{ContentStore, ContentStoreConfig, StorageRef};
//!
//! # async fn example() -> Result<(), content_store::ContentStoreError> {
//! let store = ContentStore::new(ContentStoreConfig::Memory).await?;
//! let storage_ref = StorageRef::generate();
//! store.write(&storage_ref, Bytes::from("hello")).await?;
//! assert_eq!(store.stat(&storage_ref).await?.size, 5);
//! # Ok(())
//! # }
//! ```

mod error;
mod reference;
mod storage;

pub use error::{ContentStoreError, Result};
pub use reference::StorageRef;
pub use storage::{ByteStream, ContentStore, ContentStoreConfig, ObjectStat};
