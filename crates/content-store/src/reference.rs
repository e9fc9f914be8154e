use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque key addressing a blob in the [`ContentStore`](crate::ContentStore).
///
/// References are deliberately unrelated to remote paths, so the physical
/// layout of the store never leaks the logical layout of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRef(String);

impl StorageRef {
    /// Mint a fresh, never-before-used reference.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StorageRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
