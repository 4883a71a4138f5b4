use anyhow::bail;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

use super::ports::{LogsClient, MetricsClient, TracesClient};
use super::providers::loki::{LokiAdapter, LokiClient};
use super::providers::prometheus::{PrometheusAdapter, PrometheusClient};
use super::providers::tempo::{TempoAdapter, TempoClient};
use super::wire::ProvidersListing;
use crate::config::{ObservabilityConfig, ProviderEntry, ProviderKind};

/// Central registry mapping provider names to their clients, per kind.
///
/// Built once from configuration and read-only afterwards. Registration
/// order is remembered so "the first provider of a kind" is the first one
/// declared in the configuration file.
#[derive(Default)]
pub struct ProviderRegistry {
    logs: HashMap<String, Arc<dyn LogsClient>>,
    traces: HashMap<String, Arc<dyn TracesClient>>,
    metrics: HashMap<String, Arc<dyn MetricsClient>>,
    logs_order: Vec<String>,
    traces_order: Vec<String>,
    metrics_order: Vec<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the observability section into a registry. Disabled providers
    /// are skipped; a disabled section refuses construction.
    pub fn from_config(config: &ObservabilityConfig, client: Client) -> anyhow::Result<Self> {
        if !config.enabled {
            bail!("observability module is disabled");
        }

        let mut registry = Self::new();

        for entry in enabled(&config.logs) {
            let adapter = match entry.provider_type.as_str() {
                "loki" => LokiAdapter::new(LokiClient::from_entry(client.clone(), entry)),
                other => unsupported(ProviderKind::Logs, &entry.name, other)?,
            };
            registry.register_logs(entry.name.clone(), Arc::new(adapter));
        }

        for entry in enabled(&config.traces) {
            let adapter = match entry.provider_type.as_str() {
                "tempo" => TempoAdapter::new(TempoClient::from_entry(client.clone(), entry)),
                other => unsupported(ProviderKind::Traces, &entry.name, other)?,
            };
            registry.register_traces(entry.name.clone(), Arc::new(adapter));
        }

        for entry in enabled(&config.metrics) {
            let adapter = match entry.provider_type.as_str() {
                "prometheus" => {
                    PrometheusAdapter::new(PrometheusClient::from_entry(client.clone(), entry))
                }
                other => unsupported(ProviderKind::Metrics, &entry.name, other)?,
            };
            registry.register_metrics(entry.name.clone(), Arc::new(adapter));
        }

        Ok(registry)
    }

    /// Register a log store; re-registering a name replaces the client
    pub fn register_logs(&mut self, name: String, client: Arc<dyn LogsClient>) {
        if self.logs.insert(name.clone(), client).is_none() {
            self.logs_order.push(name);
        }
    }

    pub fn register_traces(&mut self, name: String, client: Arc<dyn TracesClient>) {
        if self.traces.insert(name.clone(), client).is_none() {
            self.traces_order.push(name);
        }
    }

    pub fn register_metrics(&mut self, name: String, client: Arc<dyn MetricsClient>) {
        if self.metrics.insert(name.clone(), client).is_none() {
            self.metrics_order.push(name);
        }
    }

    /// Case-sensitive lookup
    pub fn logs(&self, name: &str) -> Option<Arc<dyn LogsClient>> {
        self.logs.get(name).cloned()
    }

    pub fn traces(&self, name: &str) -> Option<Arc<dyn TracesClient>> {
        self.traces.get(name).cloned()
    }

    pub fn metrics(&self, name: &str) -> Option<Arc<dyn MetricsClient>> {
        self.metrics.get(name).cloned()
    }

    /// First configured log store, with its name
    pub fn default_logs(&self) -> Option<(&str, Arc<dyn LogsClient>)> {
        let name = self.logs_order.first()?;
        Some((name.as_str(), self.logs.get(name)?.clone()))
    }

    pub fn default_traces(&self) -> Option<(&str, Arc<dyn TracesClient>)> {
        let name = self.traces_order.first()?;
        Some((name.as_str(), self.traces.get(name)?.clone()))
    }

    pub fn default_metrics(&self) -> Option<(&str, Arc<dyn MetricsClient>)> {
        let name = self.metrics_order.first()?;
        Some((name.as_str(), self.metrics.get(name)?.clone()))
    }

    /// Registered names per kind, in configuration order
    pub fn listing(&self) -> ProvidersListing {
        ProvidersListing {
            logs: self.logs_order.clone(),
            traces: self.traces_order.clone(),
            metrics: self.metrics_order.clone(),
        }
    }

    pub fn logs_providers(&self) -> impl Iterator<Item = (&str, &Arc<dyn LogsClient>)> {
        self.logs_order
            .iter()
            .filter_map(|name| self.logs.get(name).map(|c| (name.as_str(), c)))
    }

    pub fn traces_providers(&self) -> impl Iterator<Item = (&str, &Arc<dyn TracesClient>)> {
        self.traces_order
            .iter()
            .filter_map(|name| self.traces.get(name).map(|c| (name.as_str(), c)))
    }

    pub fn metrics_providers(&self) -> impl Iterator<Item = (&str, &Arc<dyn MetricsClient>)> {
        self.metrics_order
            .iter()
            .filter_map(|name| self.metrics.get(name).map(|c| (name.as_str(), c)))
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.traces.is_empty() && self.metrics.is_empty()
    }
}

fn enabled(entries: &[ProviderEntry]) -> impl Iterator<Item = &ProviderEntry> {
    entries.iter().filter(|e| e.enabled)
}

fn unsupported<T>(kind: ProviderKind, name: &str, provider_type: &str) -> anyhow::Result<T> {
    bail!(
        "{} provider '{}' has unsupported type '{}' (expected one of: {})",
        kind,
        name,
        provider_type,
        kind.supported_types().join(", ")
    )
}
