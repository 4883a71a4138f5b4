//! Neutral provider ports.
//!
//! The controller only knows these traits. Each adapter implements exactly one
//! of them and owns the translation between the neutral model and its vendor's
//! dialect. Adapters never log and never retry: vendor failures are converted
//! to [`ProviderError`] and returned.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{LogEntry, LogQuery, Trace, TraceQuery, TraceSummary};

/// Failure of a provider call, already phrased as `<vendor> error: <message>`
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{vendor} error: {status}: {message}")]
    Upstream {
        vendor: &'static str,
        status: u16,
        message: String,
    },
    #[error("{vendor} error: {message}")]
    Transport { vendor: &'static str, message: String },
    #[error("{vendor} error: request timed out: {message}")]
    Timeout { vendor: &'static str, message: String },
    #[error("{vendor} error: invalid response: {message}")]
    Decode { vendor: &'static str, message: String },
    #[error("{vendor} error: {what} not found")]
    NotFound { vendor: &'static str, what: String },
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Log store port
#[async_trait]
pub trait LogsClient: Send + Sync + 'static {
    /// Vendor type name (e.g. "loki")
    fn provider_type(&self) -> &str;

    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ProviderError>;

    /// All label names known to the store
    async fn get_log_labels(&self) -> Result<Vec<String>, ProviderError>;

    /// Values of the `level` label
    async fn get_log_levels(&self) -> Result<Vec<String>, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}

/// Trace store port
#[async_trait]
pub trait TracesClient: Send + Sync + 'static {
    fn provider_type(&self) -> &str;

    /// Summary search (phase one of an explorer traces query)
    async fn query_traces(&self, query: &TraceQuery) -> Result<Vec<TraceSummary>, ProviderError>;

    /// Full trace by id; `NotFound` when the store has no spans for it
    async fn get_trace_detail(&self, trace_id: &str) -> Result<Trace, ProviderError>;

    async fn get_services(&self) -> Result<Vec<String>, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}

/// Metrics store port. Query execution is not part of it.
#[async_trait]
pub trait MetricsClient: Send + Sync + 'static {
    fn provider_type(&self) -> &str;

    async fn get_metric_names(&self) -> Result<Vec<String>, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}
