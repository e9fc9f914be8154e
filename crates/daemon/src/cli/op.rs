use std::error::Error;
use std::path::PathBuf;

use url::Url;

use stowage_daemon::state::{AppState, DEFAULT_LISTEN_PORT};

/// Resolve the base URL of the daemon.
///
/// Priority: explicit `--remote` flag > config file `listen_port` > default port.
pub fn resolve_remote(explicit: Option<Url>, config_path: Option<PathBuf>) -> Url {
    if let Some(url) = explicit {
        return url;
    }
    let port = AppState::load(config_path)
        .map(|state| state.config.listen_port)
        .unwrap_or(DEFAULT_LISTEN_PORT);
    Url::parse(&format!("http://localhost:{}", port)).expect("localhost URL must parse")
}

#[derive(Clone)]
pub struct OpContext {
    /// HTTP client for talking to a running daemon
    pub client: reqwest::Client,
    /// Base URL of the daemon
    pub remote: Url,
    /// Optional custom config path (defaults to ~/.stowage)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(remote: Url, config_path: Option<PathBuf>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            remote,
            config_path,
        })
    }

    /// `path` joined onto the daemon's base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.remote.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
