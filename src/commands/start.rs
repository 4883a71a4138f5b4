use anyhow::{Context, Result};
use colored::Colorize;
use ops_dashboard::{config, init_tracing, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Loads configuration, initializes logging from it, then blocks in the server until shutdown.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting ops-dashboard...".green());

    let cfg = config::load_config(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    init_tracing(&cfg.server.log_level, &cfg.server.log_format);
    info!(config = %config_path.display(), "Configuration loaded");

    server::start_server(cfg).await?;

    Ok(())
}
