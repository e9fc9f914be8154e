use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::content_store::ContentStoreConfig;
use common::cors::DEFAULT_MAX_AGE_SECS;

pub const APP_NAME: &str = "stowage";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const SNAPSHOT_FILE_NAME: &str = "tree.json";
pub const CONTENT_DIR_NAME: &str = "content";
pub const DEFAULT_LISTEN_PORT: u16 = 8280;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to make cross-origin requests; `["*"]` allows any
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// `Access-Control-Max-Age` for preflight responses
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_max_age_secs() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

/// A bearer token and the scopes it grants, e.g. `documents:rw` or `*:r`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the storage HTTP server
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Default log level, `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Seeds the version salt. Changing it invalidates every ETag.
    pub instance_id: String,
    /// URL prefix storage routes are mounted under
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,
    /// Largest document body accepted by `PUT`
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub content_store: ContentStoreConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_prefix() -> String {
    "/storage".to_string()
}

pub fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

impl AppConfig {
    /// Defaults for a fresh install: a new instance id and content stored
    /// on disk at `content_path`.
    pub fn new(content_path: PathBuf) -> Self {
        Self {
            listen_port: default_listen_port(),
            log_level: default_log_level(),
            log_dir: None,
            instance_id: Uuid::new_v4().to_string(),
            storage_prefix: default_storage_prefix(),
            max_upload_bytes: default_max_upload_bytes(),
            cors: CorsConfig::default(),
            content_store: ContentStoreConfig::Local { path: content_path },
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the stowage directory (~/.stowage)
    pub stowage_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Where the tree is saved between runs
    pub snapshot_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the stowage directory path (custom or default ~/.stowage)
    pub fn stowage_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new stowage directory
    pub fn init(custom_path: Option<PathBuf>, config: Option<AppConfig>) -> Result<Self, StateError> {
        let stowage_dir = Self::stowage_dir(custom_path)?;

        if stowage_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&stowage_dir)?;

        let content_path = stowage_dir.join(CONTENT_DIR_NAME);
        fs::create_dir_all(&content_path)?;

        let config = config.unwrap_or_else(|| AppConfig::new(content_path));
        let config_path = stowage_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        Ok(Self {
            snapshot_path: stowage_dir.join(SNAPSHOT_FILE_NAME),
            stowage_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the stowage directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let stowage_dir = Self::stowage_dir(custom_path)?;

        if !stowage_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = stowage_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            snapshot_path: stowage_dir.join(SNAPSHOT_FILE_NAME),
            stowage_dir,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stowage directory not initialized. Run 'stowage init' first")]
    NotInitialized,

    #[error("stowage directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("stowage");

        let created = AppState::init(Some(dir.clone()), None).unwrap();
        assert!(dir.join(CONTENT_DIR_NAME).is_dir());
        assert_eq!(
            created.config.content_store,
            ContentStoreConfig::Local {
                path: dir.join(CONTENT_DIR_NAME)
            }
        );

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config, created.config);
        assert_eq!(loaded.snapshot_path, dir.join(SNAPSHOT_FILE_NAME));

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_missing_dir() {
        let temp = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(temp.path().join("nope"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            instance_id = "abc"

            [cors]
            allowed_origins = ["https://app.example"]

            [[tokens]]
            token = "secret"
            scopes = ["documents:rw"]
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_port, 8280);
        assert_eq!(config.storage_prefix, "/storage");
        assert_eq!(config.content_store, ContentStoreConfig::Memory);
        assert_eq!(config.cors.max_age_secs, DEFAULT_MAX_AGE_SECS);
        assert_eq!(config.tokens[0].scopes, vec!["documents:rw"]);
    }
}
