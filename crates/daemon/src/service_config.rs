use std::path::PathBuf;
use std::str::FromStr;

use common::content_store::ContentStoreConfig;

use crate::state::{default_max_upload_bytes, AppState, CorsConfig, TokenConfig};

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// Port for the storage HTTP server
    pub listen_port: u16,
    /// URL prefix the storage routes live under, e.g. `/storage`
    pub storage_prefix: String,
    /// Request body limit for storage routes
    pub max_upload_bytes: usize,
    pub cors: CorsConfig,
    pub tokens: Vec<TokenConfig>,

    // storage configuration
    /// Seeds the version salt
    pub instance_id: String,
    pub content_store: ContentStoreConfig,
    /// Where the tree is saved on shutdown and restored on startup,
    ///  if not set the tree only lives in memory
    pub snapshot_path: Option<PathBuf>,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_app_state(state: &AppState) -> Result<Self, ConfigError> {
        let config = &state.config;
        let log_level = tracing::Level::from_str(&config.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(config.log_level.clone()))?;

        Ok(Self {
            listen_port: config.listen_port,
            storage_prefix: config.storage_prefix.clone(),
            max_upload_bytes: config.max_upload_bytes,
            cors: config.cors.clone(),
            tokens: config.tokens.clone(),
            instance_id: config.instance_id.clone(),
            content_store: config.content_store.clone(),
            snapshot_path: Some(state.snapshot_path.clone()),
            log_level,
            log_dir: config.log_dir.clone(),
        })
    }

    /// In-memory everything; nothing survives the process.
    pub fn ephemeral(instance_id: &str) -> Self {
        Self {
            listen_port: 0,
            storage_prefix: "/storage".to_string(),
            max_upload_bytes: default_max_upload_bytes(),
            cors: CorsConfig::default(),
            tokens: Vec::new(),
            instance_id: instance_id.to_string(),
            content_store: ContentStoreConfig::Memory,
            snapshot_path: None,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}
