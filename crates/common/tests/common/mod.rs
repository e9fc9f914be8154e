//! Shared test utilities for drive integration tests
#![allow(dead_code)]

use bytes::Bytes;
use common::content_store::{ContentStore, ContentStoreConfig};
use common::prelude::*;
use tempfile::TempDir;

pub const INSTANCE_ID: &str = "integration-tests";

/// Set up a drive backed by a local content store in a temp dir
pub async fn setup_test_env() -> (Drive, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let drive = drive_at(&temp_dir, INSTANCE_ID).await;
    (drive, temp_dir)
}

/// A fresh drive over the content already stored under `temp_dir`
pub async fn drive_at(temp_dir: &TempDir, instance_id: &str) -> Drive {
    let store = ContentStore::new(ContentStoreConfig::Local {
        path: temp_dir.path().join("content"),
    })
    .await
    .unwrap();
    Drive::new(store, Salt::from_instance_id(instance_id))
}

pub fn path(raw: &str) -> RemotePath {
    RemotePath::parse(raw).unwrap()
}

/// Unconditionally store `body` at `raw`, returning the new version
pub async fn put(drive: &Drive, raw: &str, body: &'static [u8]) -> Version {
    drive
        .store_document(
            &path(raw),
            Bytes::from_static(body),
            "text/plain",
            &Conditions::default(),
        )
        .await
        .unwrap()
        .version
}
