use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub api_keys: Vec<ApiKeyConfig>,
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Upper bound for a whole request, provider calls included
    #[serde(default = "default_request_timeout", with = "duration::serde_str")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub key: String,
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub enabled: bool,

    /// Maximum number of trace-by-id requests in flight for one explorer query
    #[serde(default = "default_trace_fetch_concurrency")]
    pub trace_fetch_concurrency: usize,

    #[serde(default)]
    pub logs: Vec<ProviderEntry>,
    #[serde(default)]
    pub traces: Vec<ProviderEntry>,
    #[serde(default)]
    pub metrics: Vec<ProviderEntry>,
}

/// One backend deployment (a Loki, a Tempo, a Prometheus) reachable over HTTP.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub url: String,
    #[serde(default = "default_provider_timeout", with = "duration::serde_str")]
    pub timeout: Duration,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Basic,
    Bearer,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

/// Provider kind, used for validation messages and registry lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Logs,
    Traces,
    Metrics,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::Traces => "traces",
            Self::Metrics => "metrics",
        }
    }

    /// Vendor types that can serve this kind
    pub fn supported_types(&self) -> &'static [&'static str] {
        match self {
            Self::Logs => &["loki"],
            Self::Traces => &["tempo"],
            Self::Metrics => &["prometheus"],
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_trace_fetch_concurrency() -> usize {
    8
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_enabled() -> bool {
    true
}

/// Load configuration from a YAML file, with `OPS_DASHBOARD__*` environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Yaml))
        .add_source(config::Environment::with_prefix("OPS_DASHBOARD").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    // The observability module refuses construction when switched off
    if !cfg.observability.enabled {
        anyhow::bail!("observability module is disabled");
    }

    if cfg.api_keys.is_empty() {
        anyhow::bail!("At least one API key must be configured");
    }

    for key in &cfg.api_keys {
        if key.name.is_empty() {
            anyhow::bail!("API key name cannot be empty");
        }
        if key.key.is_empty() {
            anyhow::bail!("API key '{}' has an empty key", key.name);
        }
    }

    if cfg.observability.trace_fetch_concurrency == 0 {
        anyhow::bail!("observability.trace_fetch_concurrency must be greater than 0");
    }

    validate_providers(ProviderKind::Logs, &cfg.observability.logs)?;
    validate_providers(ProviderKind::Traces, &cfg.observability.traces)?;
    validate_providers(ProviderKind::Metrics, &cfg.observability.metrics)?;

    if cfg.metrics.enabled && !cfg.metrics.endpoint.starts_with('/') {
        anyhow::bail!("metrics.endpoint must start with '/'");
    }

    Ok(())
}

fn validate_providers(kind: ProviderKind, entries: &[ProviderEntry]) -> anyhow::Result<()> {
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.name.is_empty() {
            anyhow::bail!("{} provider name cannot be empty", kind);
        }
        if !seen.insert(entry.name.as_str()) {
            anyhow::bail!("Duplicate {} provider name: {}", kind, entry.name);
        }
        if !kind.supported_types().contains(&entry.provider_type.as_str()) {
            anyhow::bail!(
                "{} provider '{}' has unsupported type '{}' (expected one of: {})",
                kind,
                entry.name,
                entry.provider_type,
                kind.supported_types().join(", ")
            );
        }
        if entry.url.is_empty() {
            anyhow::bail!("{} provider '{}' has an empty url", kind, entry.name);
        }
        if let Err(e) = url::Url::parse(&entry.url) {
            anyhow::bail!("{} provider '{}' has an invalid url: {}", kind, entry.name, e);
        }
        if entry.timeout.is_zero() {
            anyhow::bail!("{} provider '{}' timeout must be greater than 0", kind, entry.name);
        }
        if let Some(auth) = &entry.auth {
            match auth.auth_type {
                AuthType::Basic if auth.username.as_deref().unwrap_or("").is_empty() => {
                    anyhow::bail!(
                        "{} provider '{}' uses basic auth without a username",
                        kind,
                        entry.name
                    );
                }
                AuthType::Bearer if auth.token.as_deref().unwrap_or("").is_empty() => {
                    anyhow::bail!(
                        "{} provider '{}' uses bearer auth without a token",
                        kind,
                        entry.name
                    );
                }
                _ => {}
            }
        }
    }

    Ok(())
}
