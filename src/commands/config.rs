use anyhow::{Context, Result};
use colored::Colorize;
use ops_dashboard::config::{self, Config, ProviderEntry};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with secrets masked
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let yaml = serde_yaml::to_string(&sanitized)?;
    println!("{}", yaml);

    info!("Configuration displayed successfully");
    Ok(())
}

/// Sanitize secrets in configuration for safe display
///
/// Masks dashboard API keys and every provider credential
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();

    for key in &mut sanitized.api_keys {
        key.key = mask_api_key(&key.key);
    }

    let observability = &mut sanitized.observability;
    for entry in observability
        .logs
        .iter_mut()
        .chain(observability.traces.iter_mut())
        .chain(observability.metrics.iter_mut())
    {
        mask_provider_auth(entry);
    }

    sanitized
}

fn mask_provider_auth(entry: &mut ProviderEntry) {
    if let Some(auth) = entry.auth.as_mut() {
        // Passwords are never partially shown
        if auth.password.is_some() {
            auth.password = Some("***".to_string());
        }
        if let Some(token) = auth.token.as_deref() {
            auth.token = Some(mask_api_key(token));
        }
    }
}

/// Mask an API key for safe display
///
/// Shows first 7 and last 4 characters with asterisks in between
/// Example: "sk-1234567890abcdef" -> "sk-1234...cdef"
fn mask_api_key(key: &str) -> String {
    if key.len() <= 11 || !key.is_ascii() {
        // Too short to mask meaningfully
        return "***".to_string();
    }

    let prefix = &key[..7];
    let suffix = &key[key.len() - 4..];

    format!("{}...{}", prefix, suffix)
}
