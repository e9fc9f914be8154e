use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use content_store::StorageRef;

use crate::path::RemotePath;
use crate::version::Version;

/// `Last-Modified` / hashing format for document timestamps.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

// A node is either a folder or a document; which one is fixed by the
//  shape of its path and never changes for the node's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Folder(Folder),
    Document(Document),
}

impl Node {
    pub fn path(&self) -> &RemotePath {
        match self {
            Node::Folder(folder) => folder.path(),
            Node::Document(document) => document.path(),
        }
    }

    /// Cached tag, `None` while stale.
    pub fn version(&self) -> Option<Version> {
        match self {
            Node::Folder(folder) => folder.version,
            Node::Document(document) => document.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    path: RemotePath,
    // children are owned here, so a child's parent is always the folder
    //  holding it. BTreeMap keeps names sorted for versioning.
    pub(super) children: BTreeMap<String, Node>,
    pub(super) version: Option<Version>,
}

impl Folder {
    pub(super) fn new(path: RemotePath) -> Self {
        debug_assert!(path.is_folder());
        Self {
            path,
            children: BTreeMap::new(),
            version: None,
        }
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn children(&self) -> &BTreeMap<String, Node> {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: RemotePath,
    storage_ref: StorageRef,
    mime: String,
    length: u64,
    last_modified: DateTime<Utc>,
    pub(super) version: Option<Version>,
}

impl Document {
    pub fn new(
        path: RemotePath,
        storage_ref: StorageRef,
        mime: String,
        length: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        debug_assert!(path.is_document());
        Self {
            path,
            storage_ref,
            mime,
            length,
            last_modified,
            version: None,
        }
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn storage_ref(&self) -> &StorageRef {
        &self.storage_ref
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn last_modified_http(&self) -> String {
        self.last_modified.format(HTTP_DATE_FORMAT).to_string()
    }

    pub fn set_last_modified(&mut self, last_modified: DateTime<Utc>) {
        self.last_modified = last_modified;
        self.version = None;
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn with_version(mut self, version: Option<Version>) -> Self {
        self.version = version;
        self
    }

    /// Owned view with a fresh tag. Panics in debug builds if stale.
    pub(super) fn info(&self, version: Version) -> DocumentInfo {
        debug_assert!(self.version.is_none() || self.version == Some(version));
        DocumentInfo {
            path: self.path.clone(),
            storage_ref: self.storage_ref.clone(),
            mime: self.mime.clone(),
            length: self.length,
            last_modified: self.last_modified,
            version,
        }
    }
}

/// Snapshot of a document handed out of the tree lock. The version is
///  always fresh at the time it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub path: RemotePath,
    pub storage_ref: StorageRef,
    pub mime: String,
    pub length: u64,
    pub last_modified: DateTime<Utc>,
    pub version: Version,
}

impl DocumentInfo {
    pub fn last_modified_http(&self) -> String {
        self.last_modified.format(HTTP_DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeInfo {
    Folder { path: RemotePath, version: Version },
    Document(DocumentInfo),
}

impl NodeInfo {
    pub fn path(&self) -> &RemotePath {
        match self {
            NodeInfo::Folder { path, .. } => path,
            NodeInfo::Document(document) => &document.path,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            NodeInfo::Folder { version, .. } => *version,
            NodeInfo::Document(document) => document.version,
        }
    }
}

/// One child in a folder listing.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingEntry {
    Folder {
        name: String,
        version: Version,
    },
    Document {
        name: String,
        version: Version,
        mime: String,
        length: u64,
        last_modified: DateTime<Utc>,
    },
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        match self {
            ListingEntry::Folder { name, .. } => name,
            ListingEntry::Document { name, .. } => name,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            ListingEntry::Folder { version, .. } => *version,
            ListingEntry::Document { version, .. } => *version,
        }
    }
}

/// A folder's children, in ascending name order, plus the folder's tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub path: RemotePath,
    pub version: Version,
    pub entries: Vec<ListingEntry>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_http_date_format() {
        let doc = Document::new(
            RemotePath::parse("/a").unwrap(),
            StorageRef::generate(),
            "text/plain".to_string(),
            0,
            Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap(),
        );
        assert_eq!(doc.last_modified_http(), "Wed, 21 Oct 2015 07:28:00 GMT");
    }

    #[test]
    fn test_set_last_modified_invalidates() {
        let mut doc = Document::new(
            RemotePath::parse("/a").unwrap(),
            StorageRef::generate(),
            "text/plain".to_string(),
            0,
            Utc::now(),
        );
        doc.version = Some(crate::version::VersionEngine::new(
            crate::version::Salt::from_instance_id("x"),
        )
        .folder_version("", []));
        doc.set_last_modified(Utc::now());
        assert_eq!(doc.version(), None);
    }
}
