use clap::Args;

use stowage_daemon::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(String),
}

async fn check_endpoint(ctx: &crate::cli::op::OpContext, label: &str, path: &str) -> String {
    match ctx.client.get(ctx.endpoint(path)).send().await {
        Ok(resp) if resp.status().is_success() => format!("  {:<7} OK", label),
        Ok(resp) => format!("  {:<7} UNHEALTHY ({})", label, resp.status()),
        Err(_) => format!("  {:<7} NOT REACHABLE", label),
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        lines.push("Config:".to_string());
        match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:      {}", state.stowage_dir.display()));
                lines.push("  config.toml:    OK".to_string());
                let snapshot = if state.snapshot_path.exists() {
                    "OK"
                } else {
                    "not written yet"
                };
                lines.push(format!("  tree.json:      {}", snapshot));
                lines.push(format!("  listen_port:    {}", state.config.listen_port));
                lines.push(format!("  storage_prefix: {}", state.config.storage_prefix));
                lines.push(format!("  tokens:         {}", state.config.tokens.len()));
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
            }
        }

        lines.push(String::new());
        lines.push(format!("Daemon ({}):", ctx.remote));
        lines.push(check_endpoint(ctx, "livez:", "/_status/livez").await);
        lines.push(check_endpoint(ctx, "readyz:", "/_status/readyz").await);

        Ok(lines.join("\n"))
    }
}
