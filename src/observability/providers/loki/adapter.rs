use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::client::{LokiClient, Stream, VENDOR};
use crate::observability::models::{
    normalize_level, timestamp_from_nanos, LogEntry, LogQuery, DEFAULT_LIMIT,
};
use crate::observability::ports::{LogsClient, ProviderError};
use crate::observability::query_parser::quote_selector_value;

/// Matches every stream that has a `job` label
pub const CATCH_ALL_SELECTOR: &str = r#"{job=~".+"}"#;

/// [`LogsClient`] over Loki
#[derive(Debug, Clone)]
pub struct LokiAdapter {
    client: LokiClient,
}

impl LokiAdapter {
    pub fn new(client: LokiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogsClient for LokiAdapter {
    fn provider_type(&self) -> &str {
        VENDOR
    }

    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ProviderError> {
        let selector = build_selector(query);
        let end = query.end.unwrap_or_else(Utc::now);
        let start = query.start.unwrap_or(end - chrono::Duration::hours(1));
        let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
        let direction = query.direction.unwrap_or_default();

        let streams = self
            .client
            .query_range(&selector, to_nanos(start), to_nanos(end), limit, direction)
            .await?;

        to_log_entries(streams)
    }

    async fn get_log_labels(&self) -> Result<Vec<String>, ProviderError> {
        self.client.labels().await
    }

    async fn get_log_levels(&self) -> Result<Vec<String>, ProviderError> {
        self.client.label_values("level").await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.client.ready().await
    }
}

/// LogQL selector for a query.
///
/// A caller-supplied query wins; otherwise `service` and `level` become
/// `app` and `level` matchers; with neither, every stream matches.
pub fn build_selector(query: &LogQuery) -> String {
    if let Some(native) = non_empty(query.query.as_deref()) {
        return native.to_string();
    }

    let mut terms = Vec::new();
    if let Some(service) = non_empty(query.service.as_deref()) {
        terms.push(format!("app={}", quote_selector_value(service)));
    }
    if let Some(level) = non_empty(query.level.as_deref()) {
        terms.push(format!("level={}", quote_selector_value(level)));
    }

    if terms.is_empty() {
        CATCH_ALL_SELECTOR.to_string()
    } else {
        format!("{{{}}}", terms.join(","))
    }
}

/// Flatten streams into entries, keeping stream order then line order
pub fn to_log_entries(streams: Vec<Stream>) -> Result<Vec<LogEntry>, ProviderError> {
    let capacity = streams.iter().map(|s| s.values.len()).sum();
    let mut entries = Vec::with_capacity(capacity);

    for stream in streams {
        let labels = stream.stream;
        for value in stream.values {
            let nanos: i64 = value.timestamp.trim().parse().map_err(|_| ProviderError::Decode {
                vendor: VENDOR,
                message: format!("invalid log timestamp '{}'", value.timestamp),
            })?;
            let timestamp = if nanos >= 0 {
                timestamp_from_nanos(nanos as u64)
            } else {
                DateTime::from_timestamp_nanos(nanos)
            };

            let metadata = value.metadata;
            let trace_id = first_label(&labels, &["trace_id", "traceID"])
                .or_else(|| first_metadata(metadata.as_ref(), &["trace_id", "traceID"]));
            let span_id = first_label(&labels, &["span_id", "spanID"])
                .or_else(|| first_metadata(metadata.as_ref(), &["span_id", "spanID"]));

            entries.push(LogEntry {
                id: LogEntry::stable_id(nanos, &value.line),
                timestamp,
                level: first_label(&labels, &["level", "detected_level"])
                    .map(|l| normalize_level(&l))
                    .unwrap_or_default(),
                service: first_label(&labels, &["service", "service_name", "app"])
                    .unwrap_or_default(),
                host: first_label(&labels, &["host", "hostname"]).unwrap_or_default(),
                source: first_label(&labels, &["source", "filename"]).unwrap_or_default(),
                message: value.line,
                trace_id,
                span_id,
                labels: labels.clone(),
                metadata,
            });
        }
    }

    Ok(entries)
}

fn first_label(labels: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| labels.get(*k))
        .find(|v| !v.is_empty())
        .cloned()
}

fn first_metadata(
    metadata: Option<&BTreeMap<String, serde_json::Value>>,
    keys: &[&str],
) -> Option<String> {
    let metadata = metadata?;
    keys.iter()
        .filter_map(|k| metadata.get(*k))
        .filter_map(|v| v.as_str())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn to_nanos(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(i64::MAX)
}
