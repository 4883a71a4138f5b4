//! Explorer controller: parse, pick a provider, dispatch, assemble.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::models::{LogEntry, LogQuery, Trace, TraceQuery, TraceSpan, DEFAULT_LIMIT};
use super::ports::{LogsClient, MetricsClient, ProviderError, TracesClient};
use super::query_parser::{self, DataSource, ParseError, ParsedQuery};
use super::registry::ProviderRegistry;
use super::wire::{ProviderHealth, ProvidersListing, QueryResults};
use crate::error::AppError;
use crate::metrics;

/// Upper bound for `LIMIT n`
pub const MAX_LIMIT: usize = 1000;

/// Query window, always UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Missing bounds become `now - 1h` and `now`. An inverted window is
    /// passed through for the provider to reject.
    pub fn resolve(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            start: from.unwrap_or(now - chrono::Duration::hours(1)),
            end: to.unwrap_or(now),
        }
    }
}

/// Successful explorer query
#[derive(Debug)]
pub struct QueryOutcome {
    pub data_source: DataSource,
    pub results: QueryResults,
    pub total: usize,
    pub execution_time_ms: u64,
}

/// Failed explorer query; `data_source` is known once parsing succeeded
#[derive(Debug)]
pub struct QueryFailure {
    pub data_source: Option<DataSource>,
    pub error: AppError,
    pub execution_time_ms: u64,
}

pub struct ExplorerController {
    registry: Arc<ProviderRegistry>,
    trace_fetch_concurrency: usize,
}

impl ExplorerController {
    pub fn new(registry: Arc<ProviderRegistry>, trace_fetch_concurrency: usize) -> Self {
        Self {
            registry,
            trace_fetch_concurrency: trace_fetch_concurrency.max(1),
        }
    }

    /// Run one explorer query end to end
    pub async fn execute(
        &self,
        input: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        provider: &str,
    ) -> Result<QueryOutcome, QueryFailure> {
        let started = Instant::now();

        let parsed = match query_parser::parse(input) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(query = %input, error = %e, "Failed to parse explorer query");
                let error = match e {
                    ParseError::Empty => AppError::InvalidArgument(e.to_string()),
                    other => AppError::Parse(other),
                };
                return Err(QueryFailure {
                    data_source: None,
                    error,
                    execution_time_ms: elapsed_ms(started),
                });
            }
        };

        let data_source = parsed.data_source;

        if parsed.coerced_disjunction {
            debug!(query = %input, "OR in WHERE clause is evaluated as AND");
        }

        if provider.is_empty() {
            return Err(QueryFailure {
                data_source: Some(data_source),
                error: AppError::InvalidArgument("provider is required".to_string()),
                execution_time_ms: elapsed_ms(started),
            });
        }

        let window = TimeWindow::resolve(from, to, Utc::now());

        let result = match data_source {
            DataSource::Logs => self
                .execute_logs(&parsed, window, provider)
                .await
                .map(|(entries, total)| (QueryResults::Logs(entries), total)),
            DataSource::Traces => self
                .execute_traces(&parsed, window, provider)
                .await
                .map(|(spans, total)| (QueryResults::Spans(spans), total)),
            DataSource::Metrics => Err(AppError::NotImplemented(
                "metrics queries are not yet implemented".to_string(),
            )),
        };

        let elapsed = started.elapsed();
        let execution_time_ms = duration_ms(elapsed);
        let provider_label = self.metric_provider_label(data_source, provider);

        match result {
            Ok((results, total)) => {
                metrics::record_query(data_source.as_str(), provider_label, "success", elapsed);
                info!(
                    data_source = %data_source,
                    provider = %provider,
                    total = total,
                    execution_time_ms = execution_time_ms,
                    "Explorer query completed"
                );
                Ok(QueryOutcome {
                    data_source,
                    results,
                    total,
                    execution_time_ms,
                })
            }
            Err(error) => {
                metrics::record_query(
                    data_source.as_str(),
                    provider_label,
                    outcome_label(&error),
                    elapsed,
                );
                Err(QueryFailure {
                    data_source: Some(data_source),
                    error,
                    execution_time_ms,
                })
            }
        }
    }

    /// Logs path: one outbound call
    pub async fn execute_logs(
        &self,
        parsed: &ParsedQuery,
        window: TimeWindow,
        provider: &str,
    ) -> Result<(Vec<LogEntry>, usize), AppError> {
        let client = self.named_logs(provider)?;

        let query = LogQuery {
            service: parsed.filter_str("service").map(str::to_string),
            level: parsed.filter_str("level").map(str::to_string),
            query: Some(parsed.raw_query.clone()).filter(|q| !q.is_empty()),
            start: Some(window.start),
            end: Some(window.end),
            limit: Some(effective_limit(parsed.limit)),
            direction: None,
        };

        let entries = client
            .query_logs(&query)
            .await
            .map_err(|e| AppError::upstream(DataSource::Logs.as_str(), e))?;

        let total = entries.len();
        Ok((entries, total))
    }

    /// Traces path: summary search, then detail fan-out in search order.
    /// A failed detail fetch drops that trace and the query carries on.
    pub async fn execute_traces(
        &self,
        parsed: &ParsedQuery,
        window: TimeWindow,
        provider: &str,
    ) -> Result<(Vec<TraceSpan>, usize), AppError> {
        let client = self.named_traces(provider)?;

        let query = TraceQuery {
            service: parsed.filter_str("service").map(str::to_string),
            operation: parsed.filter_str("operation").map(str::to_string),
            start: Some(window.start),
            end: Some(window.end),
            limit: Some(effective_limit(parsed.limit)),
            ..Default::default()
        };

        let summaries = client
            .query_traces(&query)
            .await
            .map_err(|e| AppError::upstream(DataSource::Traces.as_str(), e))?;

        let searched = summaries.len();
        let details: Vec<(String, Result<Trace, ProviderError>)> =
            stream::iter(summaries.into_iter().map(|summary| summary.trace_id))
                .map(|trace_id| {
                    let client = client.clone();
                    async move {
                        let detail = client.get_trace_detail(&trace_id).await;
                        (trace_id, detail)
                    }
                })
                .buffered(self.trace_fetch_concurrency)
                .collect()
                .await;

        let mut spans = Vec::new();
        let mut skipped = 0usize;
        for (trace_id, detail) in details {
            match detail {
                Ok(trace) => {
                    for orphan in trace.orphan_spans() {
                        warn!(
                            provider = %provider,
                            trace_id = %trace_id,
                            span_id = %orphan.span_id,
                            parent_span_id = ?orphan.parent_span_id,
                            "Span parent is not part of the trace"
                        );
                    }
                    spans.extend(trace.spans);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(
                        provider = %provider,
                        trace_id = %trace_id,
                        error = %e,
                        "Skipping trace whose detail could not be fetched"
                    );
                }
            }
        }

        if skipped > 0 {
            debug!(
                provider = %provider,
                searched = searched,
                skipped = skipped,
                "Trace detail fan-out finished with failures"
            );
        }

        let total = spans.len();
        Ok((spans, total))
    }

    pub async fn trace_detail(
        &self,
        trace_id: &str,
        provider: Option<&str>,
    ) -> Result<Trace, AppError> {
        if trace_id.trim().is_empty() {
            return Err(AppError::InvalidArgument("trace_id is required".to_string()));
        }

        let (name, client) = self.traces_or_default(provider)?;
        let trace = client.get_trace_detail(trace_id).await.map_err(|e| {
            if e.is_not_found() {
                AppError::TraceNotFound(trace_id.to_string())
            } else {
                AppError::upstream(DataSource::Traces.as_str(), e)
            }
        })?;

        for orphan in trace.orphan_spans() {
            warn!(
                provider = %name,
                trace_id = %trace_id,
                span_id = %orphan.span_id,
                "Span parent is not part of the trace"
            );
        }

        Ok(trace)
    }

    pub async fn log_labels(&self, provider: Option<&str>) -> Result<Vec<String>, AppError> {
        let (_, client) = self.logs_or_default(provider)?;
        client
            .get_log_labels()
            .await
            .map_err(|e| AppError::upstream(DataSource::Logs.as_str(), e))
    }

    pub async fn log_levels(&self, provider: Option<&str>) -> Result<Vec<String>, AppError> {
        let (_, client) = self.logs_or_default(provider)?;
        client
            .get_log_levels()
            .await
            .map_err(|e| AppError::upstream(DataSource::Logs.as_str(), e))
    }

    pub async fn trace_services(&self, provider: Option<&str>) -> Result<Vec<String>, AppError> {
        let (_, client) = self.traces_or_default(provider)?;
        client
            .get_services()
            .await
            .map_err(|e| AppError::upstream(DataSource::Traces.as_str(), e))
    }

    pub async fn metric_names(&self, provider: Option<&str>) -> Result<Vec<String>, AppError> {
        let (_, client) = self.metrics_or_default(provider)?;
        client
            .get_metric_names()
            .await
            .map_err(|e| AppError::upstream(DataSource::Metrics.as_str(), e))
    }

    pub fn providers(&self) -> ProvidersListing {
        self.registry.listing()
    }

    /// Health of every registered provider, probed concurrently
    pub async fn provider_health(&self) -> Vec<ProviderHealth> {
        let logs = self.registry.logs_providers().map(|(name, client)| {
            let client = client.clone();
            let name = name.to_string();
            async move { health_row(name, "logs", client.provider_type(), client.health_check().await) }
        });
        let traces = self.registry.traces_providers().map(|(name, client)| {
            let client = client.clone();
            let name = name.to_string();
            async move { health_row(name, "traces", client.provider_type(), client.health_check().await) }
        });
        let metrics = self.registry.metrics_providers().map(|(name, client)| {
            let client = client.clone();
            let name = name.to_string();
            async move { health_row(name, "metrics", client.provider_type(), client.health_check().await) }
        });

        let (mut rows, traces, metrics) = futures::join!(
            futures::future::join_all(logs),
            futures::future::join_all(traces),
            futures::future::join_all(metrics),
        );
        rows.extend(traces);
        rows.extend(metrics);
        rows
    }

    /// Provider names only become metric labels once the registry knows them
    fn metric_provider_label<'a>(&self, data_source: DataSource, provider: &'a str) -> &'a str {
        let registered = match data_source {
            DataSource::Logs => self.registry.logs(provider).is_some(),
            DataSource::Traces => self.registry.traces(provider).is_some(),
            DataSource::Metrics => self.registry.metrics(provider).is_some(),
        };
        if registered {
            provider
        } else {
            UNKNOWN_PROVIDER_LABEL
        }
    }

    fn named_logs(&self, name: &str) -> Result<Arc<dyn LogsClient>, AppError> {
        self.registry
            .logs(name)
            .ok_or_else(|| provider_not_found(DataSource::Logs, name))
    }

    fn named_traces(&self, name: &str) -> Result<Arc<dyn TracesClient>, AppError> {
        self.registry
            .traces(name)
            .ok_or_else(|| provider_not_found(DataSource::Traces, name))
    }

    fn logs_or_default(
        &self,
        provider: Option<&str>,
    ) -> Result<(String, Arc<dyn LogsClient>), AppError> {
        match provider.filter(|p| !p.is_empty()) {
            Some(name) => Ok((name.to_string(), self.named_logs(name)?)),
            None => self
                .registry
                .default_logs()
                .map(|(name, client)| (name.to_string(), client))
                .ok_or_else(|| provider_not_found(DataSource::Logs, NONE_CONFIGURED)),
        }
    }

    fn traces_or_default(
        &self,
        provider: Option<&str>,
    ) -> Result<(String, Arc<dyn TracesClient>), AppError> {
        match provider.filter(|p| !p.is_empty()) {
            Some(name) => Ok((name.to_string(), self.named_traces(name)?)),
            None => self
                .registry
                .default_traces()
                .map(|(name, client)| (name.to_string(), client))
                .ok_or_else(|| provider_not_found(DataSource::Traces, NONE_CONFIGURED)),
        }
    }

    fn metrics_or_default(
        &self,
        provider: Option<&str>,
    ) -> Result<(String, Arc<dyn MetricsClient>), AppError> {
        match provider.filter(|p| !p.is_empty()) {
            Some(name) => self
                .registry
                .metrics(name)
                .map(|client| (name.to_string(), client))
                .ok_or_else(|| provider_not_found(DataSource::Metrics, name)),
            None => self
                .registry
                .default_metrics()
                .map(|(name, client)| (name.to_string(), client))
                .ok_or_else(|| provider_not_found(DataSource::Metrics, NONE_CONFIGURED)),
        }
    }
}

const NONE_CONFIGURED: &str = "<none configured>";
const UNKNOWN_PROVIDER_LABEL: &str = "unknown";

fn provider_not_found(data_source: DataSource, name: &str) -> AppError {
    warn!(data_source = %data_source, provider = %name, "Provider not found");
    AppError::ProviderNotFound {
        kind: data_source.as_str(),
        name: name.to_string(),
    }
}

fn health_row(
    name: String,
    kind: &str,
    provider_type: &str,
    result: Result<(), ProviderError>,
) -> ProviderHealth {
    ProviderHealth {
        name,
        kind: kind.to_string(),
        provider_type: provider_type.to_string(),
        healthy: result.is_ok(),
        error: result.err().map(|e| e.to_string()),
    }
}

fn effective_limit(requested: Option<usize>) -> usize {
    requested
        .map(|n| n.clamp(1, MAX_LIMIT))
        .unwrap_or(DEFAULT_LIMIT)
}

fn outcome_label(error: &AppError) -> &'static str {
    match error {
        AppError::ProviderNotFound { .. } => "provider_not_found",
        AppError::NotImplemented(_) => "not_implemented",
        AppError::UpstreamTimeout { .. } => "timeout",
        AppError::Upstream { .. } => "upstream_error",
        _ => "error",
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
