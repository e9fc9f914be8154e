//! Node Tree
//!
//! The in-memory hierarchy mirroring the documents held in the content
//! store. The tree is purely structural: it never performs I/O, which lets
//! the [`Drive`](crate::drive::Drive) keep it behind a short-lived lock.
//!
//! Children are owned by their folder, so the parent of a node is always the
//! folder whose map holds it and `path == parent.path + name` holds by
//! construction. The remaining invariants are enforced here:
//!
//! - a name denotes at most one node: `x` and `x/` never coexist
//! - every folder on a document's path exists
//! - a non-root folder never stays empty
//! - a stale node's ancestors are all stale, so invalidation can stop at the
//!   first ancestor that is already stale

mod node;

use content_store::StorageRef;

use crate::error::ErrorKind;
use crate::path::RemotePath;
use crate::version::{Version, VersionEngine};

pub use node::{
    Document, DocumentInfo, Folder, Listing, ListingEntry, Node, NodeInfo, HTTP_DATE_FORMAT,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("path not found: {0}")]
    NotFound(RemotePath),
    #[error("path conflicts with an existing node: {0}")]
    Conflict(RemotePath),
    #[error("document version needs recomputing: {0}")]
    StaleDocument(RemotePath),
}

impl TreeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TreeError::NotFound(_) => ErrorKind::NotFound,
            TreeError::Conflict(_) => ErrorKind::Conflict,
            TreeError::StaleDocument(_) => ErrorKind::ServerError,
        }
    }
}

/// Whether an upward walk keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    Stop,
}

/// `x` <-> `x/`
fn twin_name(name: &str) -> String {
    match name.strip_suffix('/') {
        Some(document) => document.to_string(),
        None => format!("{}/", name),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    root: Folder,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            root: Folder::new(RemotePath::root()),
        }
    }

    pub fn root(&self) -> &Folder {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    fn absent(folder: &Folder, name: &str, path: &RemotePath) -> TreeError {
        if folder.children.contains_key(&twin_name(name)) {
            TreeError::Conflict(path.clone())
        } else {
            TreeError::NotFound(path.clone())
        }
    }

    /// Look up the folder at `path`.
    pub fn folder(&self, path: &RemotePath) -> Result<&Folder, TreeError> {
        if path.is_document() {
            return Err(TreeError::Conflict(path.clone()));
        }
        let mut folder = &self.root;
        for segment in path.segments() {
            folder = match folder.children.get(segment) {
                Some(Node::Folder(child)) => child,
                Some(Node::Document(_)) => return Err(TreeError::Conflict(path.clone())),
                None => return Err(Self::absent(folder, segment, path)),
            };
        }
        Ok(folder)
    }

    /// Look up the document at `path`.
    pub fn document(&self, path: &RemotePath) -> Result<&Document, TreeError> {
        let Some(parent) = path.parent().filter(|_| path.is_document()) else {
            return Err(TreeError::Conflict(path.clone()));
        };
        let folder = self.folder(&parent).map_err(|e| match e {
            TreeError::NotFound(_) => TreeError::NotFound(path.clone()),
            _ => TreeError::Conflict(path.clone()),
        })?;
        match folder.children.get(path.name()) {
            Some(Node::Document(document)) => Ok(document),
            Some(Node::Folder(_)) => Err(TreeError::Conflict(path.clone())),
            None => Err(Self::absent(folder, path.name(), path)),
        }
    }

    fn folder_mut(&mut self, path: &RemotePath) -> Option<&mut Folder> {
        let mut folder = &mut self.root;
        for segment in path.segments() {
            folder = match folder.children.get_mut(segment) {
                Some(Node::Folder(child)) => child,
                _ => return None,
            };
        }
        Some(folder)
    }

    fn document_mut(&mut self, path: &RemotePath) -> Option<&mut Document> {
        let parent = path.parent()?;
        match self.folder_mut(&parent)?.children.get_mut(path.name()) {
            Some(Node::Document(document)) => Some(document),
            _ => None,
        }
    }

    /// Visit the folder at `start`, then each ancestor up to the root, until
    /// `visit` says stop. Shared by invalidation and pruning.
    pub(crate) fn walk_up<F>(&mut self, start: &RemotePath, mut visit: F)
    where
        F: FnMut(&mut Folder) -> Walk,
    {
        let chain = std::iter::once(start.clone()).chain(start.ancestors());
        for folder_path in chain {
            let Some(folder) = self.folder_mut(&folder_path) else {
                break;
            };
            if visit(folder) == Walk::Stop {
                break;
            }
        }
    }

    /// Mark `start` and its ancestors stale.
    fn invalidate(&mut self, start: &RemotePath) {
        self.walk_up(start, |folder| match folder.version.take() {
            Some(_) => Walk::Continue,
            // already stale, so everything above is too
            None => Walk::Stop,
        });
    }

    /// Check a document could be stored at `path` without breaking the
    /// one-name-one-node rule. Returns the deepest folder on the path that
    /// already exists.
    pub fn check_insertable(&self, path: &RemotePath) -> Result<RemotePath, TreeError> {
        let Some(parent) = path.parent().filter(|_| path.is_document()) else {
            return Err(TreeError::Conflict(path.clone()));
        };

        let mut folder = &self.root;
        for segment in parent.segments() {
            match folder.children.get(segment) {
                Some(Node::Folder(child)) => folder = child,
                Some(Node::Document(_)) => return Err(TreeError::Conflict(path.clone())),
                None if folder.children.contains_key(&twin_name(segment)) => {
                    return Err(TreeError::Conflict(path.clone()))
                }
                // nothing below here exists yet
                None => return Ok(folder.path().clone()),
            }
        }

        if folder.children.contains_key(&twin_name(path.name())) {
            return Err(TreeError::Conflict(path.clone()));
        }
        Ok(folder.path().clone())
    }

    /// Insert or replace a document, creating any missing ancestor folders.
    /// Returns the document it replaced.
    pub fn insert_document(&mut self, document: Document) -> Result<Option<Document>, TreeError> {
        let path = document.path().clone();
        let deepest = self.check_insertable(&path)?;
        let Some(parent) = path.parent() else {
            return Err(TreeError::Conflict(path));
        };

        // invalidate before creating folders: new folders start stale and
        //  their ancestors must already be stale by then
        self.invalidate(&deepest);

        let mut folder = &mut self.root;
        for segment in parent.segments() {
            let child_path = folder.path().join(segment);
            let node = folder
                .children
                .entry(segment.to_string())
                .or_insert_with(|| Node::Folder(Folder::new(child_path)));
            folder = match node {
                Node::Folder(child) => child,
                Node::Document(_) => return Err(TreeError::Conflict(path)),
            };
        }

        let previous = folder
            .children
            .insert(path.name().to_string(), Node::Document(document));
        match previous {
            Some(Node::Document(previous)) => Ok(Some(previous)),
            Some(Node::Folder(_)) | None => Ok(None),
        }
    }

    /// Detach the document at `path`, prune ancestors left empty (never the
    /// root) and invalidate the survivors.
    pub fn remove_document(&mut self, path: &RemotePath) -> Result<Document, TreeError> {
        self.document(path)?;
        let Some(parent) = path.parent() else {
            return Err(TreeError::Conflict(path.clone()));
        };

        let mut pending = Some(path.name().to_string());
        let mut removed = None;
        self.walk_up(&parent, |folder| {
            if let Some(name) = pending.take() {
                let node = folder.children.remove(&name);
                if removed.is_none() {
                    removed = node;
                }
            }
            let was_fresh = folder.version.take().is_some();
            if folder.is_empty() && !folder.path().is_root() {
                pending = Some(folder.name().to_string());
                Walk::Continue
            } else if was_fresh {
                Walk::Continue
            } else {
                Walk::Stop
            }
        });

        match removed {
            Some(Node::Document(document)) => Ok(document),
            _ => Err(TreeError::NotFound(path.clone())),
        }
    }

    /// Install a recomputed tag on a stale document, unless it was replaced
    /// in the meantime. Returns whether the tag was installed.
    pub fn set_document_version(
        &mut self,
        path: &RemotePath,
        storage_ref: &StorageRef,
        version: Version,
    ) -> bool {
        match self.document_mut(path) {
            Some(document) if document.storage_ref() == storage_ref => {
                if document.version.is_none() {
                    document.version = Some(version);
                }
                true
            }
            _ => false,
        }
    }

    /// Documents at or below `path` whose tag needs recomputing from content.
    pub fn stale_documents(&self, path: &RemotePath) -> Result<Vec<Document>, TreeError> {
        fn collect(folder: &Folder, out: &mut Vec<Document>) {
            // fresh folders only hold fresh descendants
            if folder.version.is_some() {
                return;
            }
            for child in folder.children.values() {
                match child {
                    Node::Folder(child) => collect(child, out),
                    Node::Document(document) if document.version.is_none() => {
                        out.push(document.clone())
                    }
                    Node::Document(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        if path.is_folder() {
            collect(self.folder(path)?, &mut out);
        } else {
            let document = self.document(path)?;
            if document.version.is_none() {
                out.push(document.clone());
            }
        }
        Ok(out)
    }

    /// Recompute stale folder tags at and below `path`.
    ///
    /// Fails with [`TreeError::StaleDocument`] if a document below needs its
    /// content rehashed first.
    pub fn refresh(&mut self, path: &RemotePath, engine: &VersionEngine) -> Result<Version, TreeError> {
        fn refresh_folder(folder: &mut Folder, engine: &VersionEngine) -> Result<Version, TreeError> {
            if let Some(version) = folder.version {
                return Ok(version);
            }
            let mut versions = Vec::with_capacity(folder.children.len());
            for child in folder.children.values_mut() {
                let version = match child {
                    Node::Folder(child) => refresh_folder(child, engine)?,
                    Node::Document(document) => document
                        .version
                        .ok_or_else(|| TreeError::StaleDocument(document.path().clone()))?,
                };
                versions.push(version);
            }
            let version = engine.folder_version(folder.name(), &versions);
            folder.version = Some(version);
            Ok(version)
        }

        if path.is_document() {
            let document = self.document(path)?;
            return document
                .version
                .ok_or_else(|| TreeError::StaleDocument(path.clone()));
        }

        self.folder(path)?;
        let folder = self
            .folder_mut(path)
            .ok_or_else(|| TreeError::NotFound(path.clone()))?;
        refresh_folder(folder, engine)
    }

    /// Fresh view of the node at `path`.
    pub fn resolve(&mut self, path: &RemotePath, engine: &VersionEngine) -> Result<NodeInfo, TreeError> {
        let version = self.refresh(path, engine)?;
        if path.is_folder() {
            Ok(NodeInfo::Folder {
                path: path.clone(),
                version,
            })
        } else {
            Ok(NodeInfo::Document(self.document(path)?.info(version)))
        }
    }

    /// Children of the folder at `path` with fresh tags.
    pub fn list(&mut self, path: &RemotePath, engine: &VersionEngine) -> Result<Listing, TreeError> {
        if path.is_document() {
            return Err(TreeError::Conflict(path.clone()));
        }
        let version = self.refresh(path, engine)?;
        let folder = self.folder(path)?;

        let mut entries = Vec::with_capacity(folder.children.len());
        for (name, child) in folder.children.iter() {
            let child_version = child
                .version()
                .ok_or_else(|| TreeError::StaleDocument(child.path().clone()))?;
            entries.push(match child {
                Node::Folder(_) => ListingEntry::Folder {
                    name: name.clone(),
                    version: child_version,
                },
                Node::Document(document) => ListingEntry::Document {
                    name: name.clone(),
                    version: child_version,
                    mime: document.mime().to_string(),
                    length: document.length(),
                    last_modified: document.last_modified(),
                },
            });
        }

        Ok(Listing {
            path: path.clone(),
            version,
            entries,
        })
    }

    /// Every document in the tree, depth first in name order.
    pub fn documents(&self) -> Vec<&Document> {
        fn collect<'a>(folder: &'a Folder, out: &mut Vec<&'a Document>) {
            for child in folder.children.values() {
                match child {
                    Node::Folder(child) => collect(child, out),
                    Node::Document(document) => out.push(document),
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }
}
