//! Tempo HTTP API

use reqwest::Client;

use super::otlp::{SearchResponse, TagValuesResponse, TraceResponse};
use crate::config::ProviderEntry;
use crate::observability::ports::ProviderError;
use crate::observability::providers::http::ProviderHttpClient;

pub const VENDOR: &str = "tempo";

#[derive(Debug, Clone)]
pub struct TempoClient {
    http: ProviderHttpClient,
}

impl TempoClient {
    pub fn new(http: ProviderHttpClient) -> Self {
        Self { http }
    }

    pub fn from_entry(client: Client, entry: &ProviderEntry) -> Self {
        Self::new(ProviderHttpClient::from_entry(VENDOR, client, entry))
    }

    pub fn name(&self) -> &str {
        self.http.name()
    }

    /// TraceQL search; `start`/`end` are Unix seconds
    pub async fn search(
        &self,
        traceql: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<SearchResponse, ProviderError> {
        let params = [
            ("q", traceql.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("limit", limit.to_string()),
        ];
        self.http.get_json("/api/search", &params).await
    }

    /// Full trace; a 404 from Tempo becomes `NotFound`
    pub async fn trace_by_id(&self, trace_id: &str) -> Result<TraceResponse, ProviderError> {
        let path = format!("/api/traces/{}", encode_path_segment(trace_id));
        match self.http.get_json(&path, &[]).await {
            Err(ProviderError::Upstream { status: 404, .. }) => Err(ProviderError::NotFound {
                vendor: VENDOR,
                what: format!("trace {}", trace_id),
            }),
            other => other,
        }
    }

    pub async fn tag_values(&self, tag: &str) -> Result<Vec<String>, ProviderError> {
        let path = format!("/api/search/tag/{}/values", tag);
        let response: TagValuesResponse = self.http.get_json(&path, &[]).await?;
        Ok(response.tag_values)
    }

    pub async fn ready(&self) -> Result<(), ProviderError> {
        self.http.get_ok("/ready").await
    }
}

/// Percent-encode `value` for use as a single path segment
fn encode_path_segment(value: &str) -> String {
    // form encoding writes spaces as '+' and a literal '+' as %2B
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
