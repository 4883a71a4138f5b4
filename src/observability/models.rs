//! Neutral entity model shared by every provider adapter.
//!
//! Adapters translate vendor wire formats into these types; nothing above the
//! adapter layer sees a vendor type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

/// A single log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// `{timestamp_nanos}_{message_length}`
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Lower-case level, empty when unknown
    pub level: String,
    pub service: String,
    pub host: String,
    pub source: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl PartialEq for LogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LogEntry {}

impl LogEntry {
    /// Two identical lines at the same instant share an id
    pub fn stable_id(timestamp_nanos: i64, message: &str) -> String {
        format!("{}_{}", timestamp_nanos, message.len())
    }
}

/// Normalize a provider level string to the neutral lower-case vocabulary
pub fn normalize_level(level: &str) -> String {
    let lower = level.trim().to_ascii_lowercase();
    match lower.as_str() {
        "warning" | "w" => "warn".to_string(),
        "err" | "e" | "eror" => "error".to_string(),
        "information" | "informational" | "i" => "info".to_string(),
        "dbg" | "d" => "debug".to_string(),
        "trc" | "t" => "trace".to_string(),
        "crit" | "critical" | "fatal" | "panic" | "emerg" => "fatal".to_string(),
        _ => lower,
    }
}

/// One row in a traces listing; enough to list, not enough to render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub trace_id: String,
    pub root_service: String,
    pub root_operation: String,
    pub start_time: DateTime<Utc>,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    /// Matched spans, which may be fewer than the spans in the full trace
    pub span_count: usize,
    pub services: Vec<String>,
}

/// OTLP span status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStatus {
    /// 0 unset, 1 ok, 2 error
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl SpanStatus {
    pub const UNSET: i32 = 0;
    pub const OK: i32 = 1;
    pub const ERROR: i32 = 2;

    pub fn is_error(&self) -> bool {
        self.code == Self::ERROR
    }
}

/// Timestamped event attached to a span
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanLog {
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Link from one span to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanReference {
    pub ref_type: String,
    pub trace_id: String,
    pub span_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub operation_name: String,
    pub service_name: String,
    /// OTLP span kind, 0..=5
    pub kind: i32,
    pub start_time: DateTime<Utc>,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    pub tags: BTreeMap<String, serde_json::Value>,
    pub status: SpanStatus,
    #[serde(default)]
    pub logs: Vec<SpanLog>,
    #[serde(default)]
    pub references: Vec<SpanReference>,
}

impl TraceSpan {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time
            .checked_add_signed(to_chrono(self.duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A fully materialized trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    pub services: Vec<String>,
    pub spans: Vec<TraceSpan>,
}

impl Trace {
    /// Build a trace from its spans; `None` when there are no spans.
    ///
    /// Span order is kept as given.
    pub fn from_spans(trace_id: impl Into<String>, spans: Vec<TraceSpan>) -> Option<Self> {
        let start_time = spans.iter().map(|s| s.start_time).min()?;
        let end_time = spans.iter().map(TraceSpan::end_time).max()?;

        let services: BTreeSet<&str> = spans
            .iter()
            .map(|s| s.service_name.as_str())
            .filter(|s| !s.is_empty())
            .collect();

        let duration = (end_time - start_time).to_std().unwrap_or(Duration::ZERO);

        Some(Self {
            trace_id: trace_id.into(),
            start_time,
            duration,
            services: services.into_iter().map(str::to_string).collect(),
            spans,
        })
    }

    /// Spans whose parent id does not resolve to another span of this trace
    pub fn orphan_spans(&self) -> Vec<&TraceSpan> {
        let ids: HashSet<&str> = self.spans.iter().map(|s| s.span_id.as_str()).collect();
        self.spans
            .iter()
            .filter(|s| match s.parent_span_id.as_deref() {
                Some(parent) => !ids.contains(parent),
                None => false,
            })
            .collect()
    }
}

/// Fetch direction for log queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Newest first
    #[default]
    Backward,
    Forward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backward => "backward",
            Self::Forward => "forward",
        }
    }
}

/// Result limit when a query does not carry one
pub const DEFAULT_LIMIT: usize = 100;

/// Request-side value object for log queries
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub service: Option<String>,
    pub level: Option<String>,
    /// Provider-dialect query used verbatim when present
    pub query: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub direction: Option<Direction>,
}

/// Request-side value object for trace searches
#[derive(Debug, Clone, Default)]
pub struct TraceQuery {
    pub service: Option<String>,
    pub operation: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Convert nanoseconds since the epoch to an instant
pub fn timestamp_from_nanos(nanos: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(i64::try_from(nanos).unwrap_or(i64::MAX))
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Durations travel as integer nanoseconds
pub(crate) mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
