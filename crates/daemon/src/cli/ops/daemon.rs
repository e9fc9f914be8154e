use clap::Args;

use stowage_daemon::state::AppState;
use stowage_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override the storage server port (default from config)
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] stowage_daemon::state::StateError),

    #[error("config error: {0}")]
    ConfigError(#[from] stowage_daemon::service_config::ConfigError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;
        let mut config = ServiceConfig::from_app_state(&state)?;

        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir.clone();
        }

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
