//! HTTP envelopes for the observability API

use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::models::{LogEntry, TraceSpan};

/// Body of `POST /observability/query`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExplorerQueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, deserialize_with = "lenient_bound")]
    pub time_range_from: Option<String>,
    #[serde(default, deserialize_with = "lenient_bound")]
    pub time_range_to: Option<String>,
    #[serde(default)]
    pub provider: String,
}

impl ExplorerQueryRequest {
    /// Parsed window bounds in UTC; missing or malformed values are `None`
    pub fn time_range(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (
            parse_rfc3339(self.time_range_from.as_deref()),
            parse_rfc3339(self.time_range_to.as_deref()),
        )
    }
}

/// Non-string bounds are dropped here so the default window applies, as for malformed text
fn lenient_bound<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Bound {
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Bound::deserialize(deserializer)? {
        Bound::Text(text) => Some(text),
        Bound::Other(_) => {
            tracing::debug!("Ignoring non-string time range bound");
            None
        }
    })
}

fn parse_rfc3339(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value = %value, error = %e, "Ignoring malformed time range bound");
            None
        }
    }
}

/// Uniform success/error envelope
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            data,
        }
    }
}

/// Polymorphic `results` array of an explorer response
#[derive(Debug, Clone, Default)]
pub enum QueryResults {
    Logs(Vec<LogEntry>),
    Spans(Vec<TraceSpan>),
    #[default]
    Empty,
}

impl QueryResults {
    pub fn len(&self) -> usize {
        match self {
            Self::Logs(v) => v.len(),
            Self::Spans(v) => v.len(),
            Self::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for QueryResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Logs(entries) => entries.serialize(serializer),
            Self::Spans(spans) => spans.serialize(serializer),
            Self::Empty => serializer.serialize_seq(Some(0))?.end(),
        }
    }
}

/// `data` of an explorer response
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExplorerQueryData {
    pub data_source: String,
    pub results: QueryResults,
    pub total: usize,
    pub query: String,
    pub execution_time_ms: u64,
}

/// `data` of `GET /observability/providers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersListing {
    pub logs: Vec<String>,
    pub traces: Vec<String>,
    pub metrics: Vec<String>,
}

/// One row of `GET /observability/providers/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub name: String,
    pub kind: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Optional `?provider=` selector of the metadata endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderParam {
    #[serde(default)]
    pub provider: Option<String>,
}
