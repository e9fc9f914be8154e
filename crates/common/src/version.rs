//! Version Engine
//!
//! Every node carries a content-derived tag (served as its ETag):
//!
//! ```text
//! document = H(salt || name || mime || last-modified || bytes)
//! folder   = H(salt || name || version(child_0) || ... || version(child_n))
//! ```
//!
//! Children are visited in ascending name order so equivalent trees always
//! produce the same tag. `H` is BLAKE3; the salt is derived once at startup
//! from the configured instance id.
//!
//! NOTE: child digests are concatenated without framing. Two different
//! folders can only share a tag if BLAKE3 itself collides, which we accept
//! for content addressing.

use std::fmt;
use std::str::FromStr;

use futures::TryStreamExt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use content_store::{ContentStore, ContentStoreError};

use crate::tree::Document;

pub const VERSION_LEN: usize = blake3::OUT_LEN;

/// Per-instance salt mixed into every tag.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; VERSION_LEN]);

impl Salt {
    pub fn from_instance_id(instance_id: &str) -> Self {
        Self(*blake3::hash(instance_id.as_bytes()).as_bytes())
    }

    /// Identifies the salt without revealing it; stored in snapshots so a
    /// restart can tell whether cached tags are still valid.
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.0).to_hex().to_string()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Salt").field(&self.fingerprint()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("invalid version hex: {0}")]
    Hex(String),
    #[error("version must be {VERSION_LEN} bytes, got {0}")]
    Length(usize),
}

/// Fixed-length content tag. Wire form is lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version([u8; VERSION_LEN]);

impl Version {
    pub fn as_bytes(&self) -> &[u8; VERSION_LEN] {
        &self.0
    }

    /// Quoted form used in the `ETag` header.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self)
    }
}

impl From<blake3::Hash> for Version {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| VersionParseError::Hex(e.to_string()))?;
        let bytes: [u8; VERSION_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| VersionParseError::Length(b.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("content store error: {0}")]
    ContentStore(#[from] ContentStoreError),
    #[error("stored length {actual} does not match recorded length {expected}")]
    LengthMismatch { expected: u64, actual: u64 },
}

/// Incremental document hasher. Counts bytes so a short or long read from
/// the content store is caught instead of producing a bogus tag.
pub struct DocumentHasher {
    hasher: blake3::Hasher,
    expected: u64,
    seen: u64,
}

impl DocumentHasher {
    pub fn update(&mut self, chunk: &[u8]) {
        self.seen += chunk.len() as u64;
        self.hasher.update(chunk);
    }

    pub fn finish(self) -> Result<Version, VersionError> {
        if self.seen != self.expected {
            return Err(VersionError::LengthMismatch {
                expected: self.expected,
                actual: self.seen,
            });
        }
        Ok(self.hasher.finalize().into())
    }
}

#[derive(Debug, Clone)]
pub struct VersionEngine {
    salt: Salt,
}

impl VersionEngine {
    pub fn new(salt: Salt) -> Self {
        Self { salt }
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    fn salted(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.salt.0);
        hasher
    }

    /// Start hashing a document; feed it exactly `document.length()` bytes.
    pub fn document_hasher(&self, document: &Document) -> DocumentHasher {
        let mut hasher = self.salted();
        hasher.update(document.path().name().as_bytes());
        hasher.update(document.mime().as_bytes());
        hasher.update(document.last_modified_http().as_bytes());
        DocumentHasher {
            hasher,
            expected: document.length(),
            seen: 0,
        }
    }

    /// Tag for a document whose bytes are already in memory.
    pub fn document_version(
        &self,
        document: &Document,
        content: &[u8],
    ) -> Result<Version, VersionError> {
        let mut hasher = self.document_hasher(document);
        hasher.update(content);
        hasher.finish()
    }

    /// Tag for a document, streaming its bytes from the content store.
    pub async fn document_version_from_store(
        &self,
        document: &Document,
        store: &ContentStore,
    ) -> Result<Version, VersionError> {
        let mut hasher = self.document_hasher(document);
        let mut stream = store.open(document.storage_ref()).await?;
        while let Some(chunk) = stream.try_next().await? {
            hasher.update(&chunk);
        }
        hasher.finish()
    }

    /// Tag for a folder. `children` must already be in ascending name order.
    pub fn folder_version<'a, I>(&self, name: &str, children: I) -> Version
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let mut hasher = self.salted();
        hasher.update(name.as_bytes());
        for child in children {
            hasher.update(&child.0);
        }
        hasher.finalize().into()
    }
}
