use clap::Args;
use uuid::Uuid;

use stowage_daemon::state::{AppConfig, AppState, TokenConfig, CONTENT_DIR_NAME};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Storage server listen port
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Origin allowed to make cross-origin requests; repeat for more, `*` allows any
    #[arg(long = "allow-origin")]
    pub allowed_origins: Vec<String>,

    /// Keep content in memory instead of on disk
    #[arg(long)]
    pub in_memory: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] stowage_daemon::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let stowage_dir = AppState::stowage_dir(ctx.config_path.clone())?;
        let mut config = AppConfig::new(stowage_dir.join(CONTENT_DIR_NAME));

        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if self.in_memory {
            config.content_store = Default::default();
        }
        config.cors.allowed_origins = self.allowed_origins.clone();

        // full access until scopes are configured by hand
        let owner_token = Uuid::new_v4().simple().to_string();
        config.tokens.push(TokenConfig {
            token: owner_token.clone(),
            scopes: vec!["*:rw".to_string()],
        });

        let state = AppState::init(Some(stowage_dir), Some(config))?;

        let output = format!(
            "Initialized stowage directory at: {}\n\
             - Config: {}\n\
             - Tree snapshot: {}\n\
             - Content store: {:?}\n\
             - Listen port: {}\n\
             - Owner token: {}",
            state.stowage_dir.display(),
            state.config_path.display(),
            state.snapshot_path.display(),
            state.config.content_store,
            state.config.listen_port,
            owner_token,
        );

        Ok(output)
    }
}
