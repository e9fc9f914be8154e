pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "A remoteStorage server for your own documents")]
pub struct Args {
    /// Base URL of a running daemon (defaults to localhost on the configured port)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the stowage config directory (defaults to ~/.stowage)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
