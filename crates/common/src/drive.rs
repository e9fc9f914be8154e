use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use chrono::{SubsecRound, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use content_store::{ByteStream, ContentStore, ContentStoreError, StorageRef};

use crate::error::ErrorKind;
use crate::path::RemotePath;
use crate::snapshot::{Snapshot, SnapshotError};
use crate::tree::{Document, DocumentInfo, Listing, NodeInfo, Tree, TreeError};
use crate::version::{Salt, Version, VersionEngine, VersionError};

/// Once the lock table grows past this, dead entries are swept on insert.
const PATH_LOCK_SWEEP: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("precondition failed: {0}")]
    PreconditionFailed(RemotePath),
    #[error("version error: {0}")]
    Version(#[from] VersionError),
    #[error("content store error: {0}")]
    ContentStore(#[from] ContentStoreError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl DriveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriveError::Tree(e) => e.kind(),
            DriveError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DriveError::Version(_) | DriveError::ContentStore(_) => ErrorKind::Io,
            DriveError::Snapshot(_) => ErrorKind::ServerError,
        }
    }
}

/// Value of an `If-Match` / `If-None-Match` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTags {
    Any,
    /// Unquoted, lowercased tags.
    Tags(Vec<String>),
}

impl EntityTags {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return EntityTags::Any;
        }
        let tags = raw
            .split(',')
            .map(|tag| {
                let tag = tag.trim();
                let tag = tag.strip_prefix("W/").unwrap_or(tag);
                tag.trim_matches('"').to_ascii_lowercase()
            })
            .filter(|tag| !tag.is_empty())
            .collect();
        EntityTags::Tags(tags)
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self {
            EntityTags::Any => true,
            EntityTags::Tags(tags) => {
                let current = version.to_string();
                tags.iter().any(|tag| *tag == current)
            }
        }
    }
}

impl From<&Version> for EntityTags {
    fn from(version: &Version) -> Self {
        EntityTags::Tags(vec![version.to_string()])
    }
}

/// Conditional request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    pub if_match: Option<EntityTags>,
    pub if_none_match: Option<EntityTags>,
}

impl Conditions {
    pub fn if_match(tags: impl Into<EntityTags>) -> Self {
        Self {
            if_match: Some(tags.into()),
            ..Default::default()
        }
    }

    pub fn if_none_match(tags: impl Into<EntityTags>) -> Self {
        Self {
            if_none_match: Some(tags.into()),
            ..Default::default()
        }
    }

    /// `If-Match` is present and the target is absent or has another tag.
    pub fn if_match_fails(&self, current: Option<&Version>) -> bool {
        match (&self.if_match, current) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(tags), Some(current)) => !tags.matches(current),
        }
    }

    /// `If-None-Match` is present and matches the target's tag.
    pub fn if_none_match_hits(&self, current: Option<&Version>) -> bool {
        match (&self.if_none_match, current) {
            (Some(tags), Some(current)) => tags.matches(current),
            _ => false,
        }
    }

    /// Gate for a mutation. `If-Match` is evaluated first.
    pub fn check_write(&self, path: &RemotePath, current: Option<&Version>) -> Result<(), DriveError> {
        if self.if_match_fails(current) || self.if_none_match_hits(current) {
            return Err(DriveError::PreconditionFailed(path.clone()));
        }
        Ok(())
    }
}

/// Result of a successful store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stored {
    pub version: Version,
    pub created: bool,
}

/// Per-path FIFO locks. Entries are weak so idle paths cost nothing once
/// swept.
#[derive(Debug, Default)]
struct PathLocks {
    locks: Mutex<HashMap<RemotePath, Weak<AsyncMutex<()>>>>,
}

impl PathLocks {
    async fn lock(&self, path: &RemotePath) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() >= PATH_LOCK_SWEEP {
                locks.retain(|_, lock| lock.strong_count() > 0);
            }
            match locks.get(path).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(path.clone(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        // tokio's mutex queues waiters in arrival order
        lock.lock_owned().await
    }
}

struct DriveInner {
    tree: RwLock<Tree>,
    engine: VersionEngine,
    store: ContentStore,
    locks: PathLocks,
}

/// The node tree, version engine and content store behind one cheap-to-clone
/// handle.
#[derive(Clone)]
pub struct Drive(Arc<DriveInner>);

impl std::fmt::Debug for Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drive")
            .field("salt", self.0.engine.salt())
            .finish_non_exhaustive()
    }
}

impl Drive {
    pub fn new(store: ContentStore, salt: Salt) -> Self {
        Self(Arc::new(DriveInner {
            tree: RwLock::new(Tree::new()),
            engine: VersionEngine::new(salt),
            store,
            locks: PathLocks::default(),
        }))
    }

    pub fn engine(&self) -> &VersionEngine {
        &self.0.engine
    }

    pub fn store(&self) -> &ContentStore {
        &self.0.store
    }

    pub fn document_count(&self) -> usize {
        self.0.tree.read().documents().len()
    }

    /// Recompute tags for stale documents at or below `path`, reading their
    /// bytes from the store outside the tree lock.
    async fn rehash_stale(&self, path: &RemotePath) -> Result<(), DriveError> {
        let stale = {
            let tree = self.0.tree.read();
            match tree.stale_documents(path) {
                Ok(stale) => stale,
                // lookup failures are reported by the caller's resolve
                Err(_) => return Ok(()),
            }
        };

        for document in stale {
            tracing::debug!(path = %document.path(), "rehashing stale document");
            let hashed = self
                .0
                .engine
                .document_version_from_store(&document, &self.0.store)
                .await;
            let version = match hashed {
                Ok(version) => version,
                // replaced or removed while hashing; the new entry needs no rehash
                Err(_) if self.superseded(document.path(), document.storage_ref()) => continue,
                Err(e) => return Err(e.into()),
            };
            let mut tree = self.0.tree.write();
            tree.set_document_version(document.path(), document.storage_ref(), version);
        }
        Ok(())
    }

    /// Look up the node at `path` with a fresh tag.
    pub async fn resolve(&self, path: &RemotePath) -> Result<NodeInfo, DriveError> {
        loop {
            self.rehash_stale(path).await?;
            let resolved = self.0.tree.write().resolve(path, &self.0.engine);
            match resolved {
                // replaced by a stale import in the meantime
                Err(TreeError::StaleDocument(_)) => continue,
                other => return Ok(other?),
            }
        }
    }

    /// Shape-only lookup: `Ok` if a node of the path's kind is present. Tags
    /// are not refreshed, so the content store is never read.
    pub fn exists(&self, path: &RemotePath) -> Result<(), TreeError> {
        let tree = self.0.tree.read();
        if path.is_folder() {
            tree.folder(path).map(|_| ())
        } else {
            tree.document(path).map(|_| ())
        }
    }

    pub async fn document(&self, path: &RemotePath) -> Result<DocumentInfo, DriveError> {
        match self.resolve(path).await? {
            NodeInfo::Document(info) => Ok(info),
            NodeInfo::Folder { path, .. } => Err(TreeError::Conflict(path).into()),
        }
    }

    /// Children of the folder at `path` with fresh tags.
    pub async fn list(&self, path: &RemotePath) -> Result<Listing, DriveError> {
        loop {
            self.rehash_stale(path).await?;
            let listed = self.0.tree.write().list(path, &self.0.engine);
            match listed {
                Err(TreeError::StaleDocument(_)) => continue,
                other => return Ok(other?),
            }
        }
    }

    /// Whether the tree no longer maps `path` to `storage_ref`.
    fn superseded(&self, path: &RemotePath, storage_ref: &StorageRef) -> bool {
        match self.0.tree.read().document(path) {
            Ok(current) => current.storage_ref() != storage_ref,
            Err(_) => true,
        }
    }

    /// Stream a document's bytes.
    ///
    /// If a concurrent write replaced the document after `document` was
    /// taken, its old content may already be gone. The current entry is
    /// opened instead and returned alongside the stream.
    pub async fn open(
        &self,
        document: &DocumentInfo,
    ) -> Result<(DocumentInfo, ByteStream), DriveError> {
        let mut document = document.clone();
        loop {
            match self.0.store.open(&document.storage_ref).await {
                Ok(stream) => return Ok((document, stream)),
                Err(ContentStoreError::NotFound(_))
                    if self.superseded(&document.path, &document.storage_ref) =>
                {
                    tracing::debug!(path = %document.path, "document replaced while opening");
                    document = self.document(&document.path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read a document's bytes into memory.
    pub async fn read(&self, path: &RemotePath) -> Result<(DocumentInfo, Bytes), DriveError> {
        let mut document = self.document(path).await?;
        loop {
            match self.0.store.read(&document.storage_ref).await {
                Ok(content) => return Ok((document, content)),
                Err(ContentStoreError::NotFound(_))
                    if self.superseded(&document.path, &document.storage_ref) =>
                {
                    document = self.document(path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn current_version(&self, path: &RemotePath) -> Result<Option<Version>, DriveError> {
        match self.resolve(path).await {
            Ok(node) => Ok(Some(node.version())),
            Err(DriveError::Tree(TreeError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn discard(&self, storage_ref: &StorageRef) {
        if let Err(e) = self.0.store.remove(storage_ref).await {
            tracing::error!(%storage_ref, error = %e, "failed to remove content");
        }
    }

    /// Create or replace the document at `path`.
    ///
    /// The new bytes go to a fresh storage ref, so the old content stays
    /// readable until the tree commit, after which it is removed.
    pub async fn store_document(
        &self,
        path: &RemotePath,
        content: Bytes,
        mime: &str,
        conditions: &Conditions,
    ) -> Result<Stored, DriveError> {
        let _guard = self.0.locks.lock(path).await;

        let current = self.current_version(path).await?;
        conditions.check_write(path, current.as_ref())?;

        let document = Document::new(
            path.clone(),
            StorageRef::generate(),
            mime.to_string(),
            content.len() as u64,
            Utc::now().trunc_subsecs(0),
        );
        let version = self.0.engine.document_version(&document, &content)?;
        let document = document.with_version(Some(version));
        let storage_ref = document.storage_ref().clone();

        self.0.tree.read().check_insertable(path)?;
        self.0.store.write(&storage_ref, content).await?;

        let committed = self.0.tree.write().insert_document(document);
        let previous = match committed {
            Ok(previous) => previous,
            Err(e) => {
                // lost a race with a conflicting sibling
                self.discard(&storage_ref).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = &previous {
            self.discard(previous.storage_ref()).await;
        }

        tracing::debug!(%path, %version, created = previous.is_none(), "stored document");
        Ok(Stored {
            version,
            created: previous.is_none(),
        })
    }

    /// Remove the document at `path`, returning the tag it had.
    pub async fn remove_document(
        &self,
        path: &RemotePath,
        conditions: &Conditions,
    ) -> Result<Version, DriveError> {
        let _guard = self.0.locks.lock(path).await;

        let document = self.document(path).await?;
        conditions.check_write(path, Some(&document.version))?;

        let removed = self.0.tree.write().remove_document(path)?;
        self.discard(removed.storage_ref()).await;

        tracing::debug!(%path, version = %document.version, "removed document");
        Ok(document.version)
    }

    pub fn export(&self) -> Snapshot {
        let tree = self.0.tree.read();
        Snapshot::capture(&tree, self.0.engine.salt())
    }

    /// Replace the tree with a snapshot's. Tags recorded under another salt
    /// are dropped and recomputed on demand.
    pub fn import(&self, snapshot: Snapshot) -> Result<usize, DriveError> {
        let tree = snapshot.restore(self.0.engine.salt())?;
        let count = tree.documents().len();
        *self.0.tree.write() = tree;
        Ok(count)
    }

    /// Remove stored content no document refers to. Only safe before the
    /// drive starts serving writes.
    pub async fn sweep_orphans(&self) -> Result<usize, DriveError> {
        let stored = self.0.store.list().await?;
        let referenced: HashSet<StorageRef> = {
            let tree = self.0.tree.read();
            tree.documents()
                .into_iter()
                .map(|document| document.storage_ref().clone())
                .collect()
        };

        let mut removed = 0;
        for storage_ref in stored {
            if !referenced.contains(&storage_ref) {
                self.discard(&storage_ref).await;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RemotePath {
        RemotePath::parse(s).unwrap()
    }

    fn drive() -> Drive {
        Drive::new(ContentStore::memory(), Salt::from_instance_id("drive-tests"))
    }

    #[test]
    fn test_entity_tags_parse() {
        assert_eq!(EntityTags::parse(" * "), EntityTags::Any);
        assert_eq!(
            EntityTags::parse(r#""AB", W/"cd" ,"#),
            EntityTags::Tags(vec!["ab".to_string(), "cd".to_string()])
        );
    }

    #[test]
    fn test_conditions_write_rules() {
        let path = p("/a");
        let engine = VersionEngine::new(Salt::from_instance_id("x"));
        let v1 = engine.folder_version("1", []);
        let v2 = engine.folder_version("2", []);

        let cond = Conditions::if_match(&v1);
        assert!(cond.check_write(&path, Some(&v1)).is_ok());
        assert!(cond.check_write(&path, Some(&v2)).is_err());
        assert!(cond.check_write(&path, None).is_err());

        let cond = Conditions::if_match(EntityTags::Any);
        assert!(cond.check_write(&path, None).is_err());
        assert!(cond.check_write(&path, Some(&v2)).is_ok());

        let cond = Conditions::if_none_match(EntityTags::Any);
        assert!(cond.check_write(&path, None).is_ok());
        assert!(cond.check_write(&path, Some(&v1)).is_err());

        let cond = Conditions::if_none_match(&v1);
        assert!(cond.check_write(&path, Some(&v1)).is_err());
        assert!(cond.check_write(&path, Some(&v2)).is_ok());
    }

    #[tokio::test]
    async fn test_store_replaces_content_ref() {
        let drive = drive();
        let path = p("/notes/a.txt");

        let first = drive
            .store_document(&path, Bytes::from_static(b"one"), "text/plain", &Conditions::default())
            .await
            .unwrap();
        assert!(first.created);
        let (before, _) = drive.read(&path).await.unwrap();

        let second = drive
            .store_document(&path, Bytes::from_static(b"two"), "text/plain", &Conditions::default())
            .await
            .unwrap();
        assert!(!second.created);

        let (after, content) = drive.read(&path).await.unwrap();
        assert_eq!(content, Bytes::from_static(b"two"));
        assert_ne!(before.storage_ref, after.storage_ref);
        // superseded content is gone
        assert_eq!(drive.store().list().await.unwrap(), vec![after.storage_ref]);
    }

    #[tokio::test]
    async fn test_open_follows_concurrent_replace() {
        let drive = drive();
        let path = p("/notes/a");
        drive
            .store_document(&path, Bytes::from_static(b"old"), "text/plain", &Conditions::default())
            .await
            .unwrap();
        let taken = drive.document(&path).await.unwrap();

        let stored = drive
            .store_document(&path, Bytes::from_static(b"new"), "text/plain", &Conditions::default())
            .await
            .unwrap();

        let (opened, stream) = drive.open(&taken).await.unwrap();
        assert_eq!(opened.version, stored.version);
        let chunks: Vec<Bytes> = futures::TryStreamExt::try_collect(stream).await.unwrap();
        assert_eq!(chunks.concat(), b"new");
    }

    #[tokio::test]
    async fn test_open_after_concurrent_remove_is_not_found() {
        let drive = drive();
        let path = p("/notes/a");
        drive
            .store_document(&path, Bytes::from_static(b"old"), "text/plain", &Conditions::default())
            .await
            .unwrap();
        let taken = drive.document(&path).await.unwrap();
        drive.remove_document(&path, &Conditions::default()).await.unwrap();

        let Err(err) = drive.open(&taken).await else {
            panic!("expected open to fail");
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_failed_precondition_leaves_store_untouched() {
        let drive = drive();
        let path = p("/a");
        drive
            .store_document(&path, Bytes::from_static(b"x"), "text/plain", &Conditions::default())
            .await
            .unwrap();

        let result = drive
            .store_document(
                &path,
                Bytes::from_static(b"y"),
                "text/plain",
                &Conditions::if_none_match(EntityTags::Any),
            )
            .await;
        assert!(matches!(result, Err(DriveError::PreconditionFailed(_))));
        assert_eq!(drive.store().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_writes_nothing() {
        let drive = drive();
        drive
            .store_document(&p("/a"), Bytes::from_static(b"x"), "text/plain", &Conditions::default())
            .await
            .unwrap();

        let result = drive
            .store_document(&p("/a/b"), Bytes::from_static(b"y"), "text/plain", &Conditions::default())
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(drive.store().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_orphans() {
        let drive = drive();
        drive
            .store_document(&p("/kept"), Bytes::from_static(b"x"), "text/plain", &Conditions::default())
            .await
            .unwrap();
        drive
            .store()
            .write(&StorageRef::generate(), Bytes::from_static(b"orphan"))
            .await
            .unwrap();

        assert_eq!(drive.sweep_orphans().await.unwrap(), 1);
        assert_eq!(drive.store().list().await.unwrap().len(), 1);
        assert!(drive.read(&p("/kept")).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_writes_same_path() {
        let drive = drive();
        let path = p("/race");

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let drive = drive.clone();
                let path = path.clone();
                tokio::spawn(async move {
                    drive
                        .store_document(
                            &path,
                            Bytes::from(format!("body {}", i)),
                            "text/plain",
                            &Conditions::if_none_match(EntityTags::Any),
                        )
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                created += 1;
            }
        }
        // exactly one create-only write wins
        assert_eq!(created, 1);
        assert_eq!(drive.store().list().await.unwrap().len(), 1);
    }
}
