use std::path::PathBuf;
use std::sync::Arc;

use common::auth::ScopeError;
use common::content_store::{ContentStore, ContentStoreError};
use common::cors::CorsPolicy;
use common::drive::{Drive, DriveError};
use common::snapshot::{Snapshot, SnapshotError};
use common::version::Salt;

use crate::http_server::storage::TokenRegistry;
use crate::ServiceConfig;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct State {
    drive: Drive,
    cors: Arc<CorsPolicy>,
    tokens: Arc<TokenRegistry>,
    storage_prefix: Arc<str>,
    snapshot_path: Option<PathBuf>,
}

/// `/storage/` -> `/storage`, `/` -> ``
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl State {
    pub fn new(drive: Drive, cors: CorsPolicy, tokens: TokenRegistry, storage_prefix: &str) -> Self {
        Self {
            drive,
            cors: Arc::new(cors),
            tokens: Arc::new(tokens),
            storage_prefix: normalize_prefix(storage_prefix).into(),
            snapshot_path: None,
        }
    }

    pub async fn from_config(config: &ServiceConfig) -> Result<Self, StateSetupError> {
        let store = ContentStore::new(config.content_store.clone()).await?;
        let drive = Drive::new(store, Salt::from_instance_id(&config.instance_id));

        if let Some(path) = config.snapshot_path.as_ref().filter(|path| path.exists()) {
            let snapshot = Snapshot::load(path)?;
            let documents = drive.import(snapshot)?;
            tracing::info!(documents, path = %path.display(), "restored tree");

            let orphans = drive.sweep_orphans().await?;
            if orphans > 0 {
                tracing::warn!(orphans, "removed content not referenced by the tree");
            }
        }

        let cors = CorsPolicy::from_origins(&config.cors.allowed_origins)
            .with_max_age(config.cors.max_age_secs);
        let tokens = TokenRegistry::from_config(&config.tokens)?;
        tracing::info!(tokens = tokens.len(), "loaded bearer tokens");

        let mut state = Self::new(drive, cors, tokens, &config.storage_prefix);
        state.snapshot_path = config.snapshot_path.clone();
        Ok(state)
    }

    pub fn drive(&self) -> &Drive {
        &self.drive
    }

    pub fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn storage_prefix(&self) -> &str {
        &self.storage_prefix
    }

    /// Persist the tree, if a snapshot path is configured.
    pub fn save_snapshot(&self) -> Result<(), SnapshotError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = self.drive.export();
        snapshot.save(path)?;
        tracing::info!(
            documents = snapshot.documents.len(),
            path = %path.display(),
            "saved tree"
        );
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("content store error: {0}")]
    ContentStore(#[from] ContentStoreError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("drive error: {0}")]
    Drive(#[from] DriveError),
    #[error("invalid token scope: {0}")]
    Scope(#[from] ScopeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/storage"), "/storage");
        assert_eq!(normalize_prefix("storage/"), "/storage");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::ephemeral("restart");
        config.content_store = common::content_store::ContentStoreConfig::Local {
            path: temp.path().join("content"),
        };
        config.snapshot_path = Some(temp.path().join("tree.json"));

        let state = State::from_config(&config).await.unwrap();
        let path = common::path::RemotePath::parse("/a/b").unwrap();
        state
            .drive()
            .store_document(
                &path,
                bytes::Bytes::from_static(b"kept"),
                "text/plain",
                &Default::default(),
            )
            .await
            .unwrap();
        state.save_snapshot().unwrap();

        let restarted = State::from_config(&config).await.unwrap();
        let (_, content) = restarted.drive().read(&path).await.unwrap();
        assert_eq!(content, bytes::Bytes::from_static(b"kept"));
    }
}
