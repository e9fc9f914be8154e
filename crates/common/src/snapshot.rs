use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use content_store::StorageRef;

use crate::path::RemotePath;
use crate::tree::{Document, Tree, TreeError};
use crate::version::{Salt, Version};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot does not form a valid tree: {0}")]
    Tree(#[from] TreeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub path: RemotePath,
    pub storage_ref: StorageRef,
    pub mime: String,
    pub length: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

/// Every document in the tree. Folders are implied by document paths and
/// their tags are recomputed after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub salt_fingerprint: String,
    pub documents: Vec<DocumentRecord>,
}

impl Snapshot {
    pub fn capture(tree: &Tree, salt: &Salt) -> Self {
        let documents = tree
            .documents()
            .into_iter()
            .map(|document| DocumentRecord {
                path: document.path().clone(),
                storage_ref: document.storage_ref().clone(),
                mime: document.mime().to_string(),
                length: document.length(),
                last_modified: document.last_modified(),
                version: document.version(),
            })
            .collect();

        Self {
            salt_fingerprint: salt.fingerprint(),
            documents,
        }
    }

    /// Rebuild a tree. Recorded tags are only trusted if they were computed
    /// under `salt`.
    pub fn restore(self, salt: &Salt) -> Result<Tree, SnapshotError> {
        let trusted = self.salt_fingerprint == salt.fingerprint();
        if !trusted {
            tracing::warn!("snapshot salt differs, document versions will be recomputed");
        }

        let mut tree = Tree::new();
        for record in self.documents {
            if !record.path.is_document() {
                return Err(TreeError::Conflict(record.path).into());
            }
            let document = Document::new(
                record.path,
                record.storage_ref,
                record.mime,
                record.length,
                record.last_modified,
            )
            .with_version(record.version.filter(|_| trusted));
            tree.insert_document(document)?;
        }
        Ok(tree)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write atomically through a sibling temp file.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
