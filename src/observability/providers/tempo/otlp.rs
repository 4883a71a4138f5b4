//! Tempo JSON wire types: search results and OTLP trace batches.
//!
//! Tempo emits the protobuf JSON mapping, so 64-bit integers may arrive as
//! strings, enums as names or numbers, and ids as hex or base64. Every decoder
//! here accepts all of those forms.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// `GET /api/search` response
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub traces: Vec<SearchTrace>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTrace {
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(default)]
    pub root_service_name: String,
    #[serde(default)]
    pub root_trace_name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub start_time_unix_nano: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration_ms: u64,
    /// First matching span set (older Tempo releases only send this one)
    #[serde(default)]
    pub span_set: Option<SpanSet>,
    #[serde(default)]
    pub span_sets: Vec<SpanSet>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpanSet {
    #[serde(default)]
    pub spans: Vec<SearchSpan>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub matched: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSpan {
    #[serde(rename = "spanID", default)]
    pub span_id: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub start_time_unix_nano: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration_nanos: u64,
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

/// `GET /api/search/tag/<tag>/values` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagValuesResponse {
    #[serde(default)]
    pub tag_values: Vec<String>,
}

/// `GET /api/traces/<id>` response
#[derive(Debug, Default, Deserialize)]
pub struct TraceResponse {
    #[serde(default, alias = "resourceSpans")]
    pub batches: Vec<ResourceSpans>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    #[serde(default)]
    pub resource: Resource,
    #[serde(default)]
    pub scope_spans: Vec<ScopeSpans>,
    /// Pre-1.0 OTLP name of `scopeSpans`
    #[serde(default)]
    pub instrumentation_library_spans: Vec<ScopeSpans>,
}

impl ResourceSpans {
    /// `scopeSpans` followed by the legacy `instrumentationLibrarySpans`
    pub fn all_scope_spans(&self) -> impl Iterator<Item = &ScopeSpans> {
        self.scope_spans
            .iter()
            .chain(self.instrumentation_library_spans.iter())
    }

    pub fn service_name(&self) -> Option<&str> {
        find_string(&self.resource.attributes, "service.name")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeSpans {
    #[serde(default)]
    pub spans: Vec<Span>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "span_kind")]
    pub kind: i32,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub start_time_unix_nano: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub end_time_unix_nano: u64,
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub time_unix_nano: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Status {
    #[serde(default, deserialize_with = "status_code")]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: AnyValue,
}

/// OTLP attribute value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawAnyValue")]
pub enum AnyValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Array(Vec<AnyValue>),
    KvList(Vec<KeyValue>),
    /// Base64 as delivered
    Bytes(String),
    #[default]
    Null,
}

impl AnyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Last step before the value enters a neutral tag map
    pub fn into_json(self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::String(s) | Self::Bytes(s) => Value::String(s),
            Self::Int(i) => Value::from(i),
            Self::Double(d) => serde_json::Number::from_f64(d)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(d.to_string())),
            Self::Bool(b) => Value::Bool(b),
            Self::Array(values) => {
                Value::Array(values.into_iter().map(AnyValue::into_json).collect())
            }
            Self::KvList(pairs) => Value::Object(
                pairs
                    .into_iter()
                    .map(|kv| (kv.key, kv.value.into_json()))
                    .collect(),
            ),
            Self::Null => Value::Null,
        }
    }
}

/// The protobuf JSON shape: at most one field is set
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnyValue {
    string_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    int_value: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    double_value: Option<f64>,
    bool_value: Option<bool>,
    array_value: Option<ValueList>,
    kvlist_value: Option<KeyValueList>,
    bytes_value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ValueList {
    #[serde(default)]
    values: Vec<AnyValue>,
}

#[derive(Debug, Default, Deserialize)]
struct KeyValueList {
    #[serde(default)]
    values: Vec<KeyValue>,
}

impl From<RawAnyValue> for AnyValue {
    fn from(raw: RawAnyValue) -> Self {
        if let Some(s) = raw.string_value {
            Self::String(s)
        } else if let Some(i) = raw.int_value {
            Self::Int(i)
        } else if let Some(d) = raw.double_value {
            Self::Double(d)
        } else if let Some(b) = raw.bool_value {
            Self::Bool(b)
        } else if let Some(list) = raw.array_value {
            Self::Array(list.values)
        } else if let Some(list) = raw.kvlist_value {
            Self::KvList(list.values)
        } else if let Some(bytes) = raw.bytes_value {
            Self::Bytes(bytes)
        } else {
            Self::Null
        }
    }
}

/// Attributes as a neutral tag map
pub fn attributes_to_map(attributes: Vec<KeyValue>) -> BTreeMap<String, serde_json::Value> {
    attributes
        .into_iter()
        .map(|kv| (kv.key, kv.value.into_json()))
        .collect()
}

pub fn find_string<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_str())
}

/// Trace and span ids as lowercase hex.
///
/// Hex passes through lowercased; base64 that decodes to a 16 or 8 byte id is
/// re-encoded as hex; anything else is returned unchanged.
pub fn normalize_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    if raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return raw.to_ascii_lowercase();
    }
    match STANDARD.decode(raw) {
        Ok(bytes) if bytes.len() == 16 || bytes.len() == 8 => {
            bytes.iter().map(|b| format!("{:02x}", b)).collect()
        }
        _ => raw.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    use serde::de::Error;

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrString::Unsigned(n)) => Ok(n),
        Some(NumberOrString::Signed(n)) => Ok(u64::try_from(n).unwrap_or(0)),
        Some(NumberOrString::Float(f)) => Ok(if f > 0.0 { f as u64 } else { 0 }),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(0),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid integer '{}'", s))),
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    use serde::de::Error;

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Unsigned(n)) => Ok(Some(i64::try_from(n).unwrap_or(i64::MAX))),
        Some(NumberOrString::Signed(n)) => Ok(Some(n)),
        Some(NumberOrString::Float(f)) => Ok(Some(f as i64)),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid intValue '{}'", s))),
    }
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    use serde::de::Error;

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Unsigned(n)) => Ok(Some(n as f64)),
        Some(NumberOrString::Signed(n)) => Ok(Some(n as f64)),
        Some(NumberOrString::Float(f)) => Ok(Some(f)),
        // protobuf JSON spells non-finite doubles as strings
        Some(NumberOrString::Text(s)) => match s.trim() {
            "NaN" => Ok(Some(f64::NAN)),
            "Infinity" => Ok(Some(f64::INFINITY)),
            "-Infinity" => Ok(Some(f64::NEG_INFINITY)),
            other => other
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid doubleValue '{}'", s))),
        },
    }
}

/// Decode an enum that may be a number or one of `names` (indexed by value)
fn enum_code<'de, D: Deserializer<'de>>(deserializer: D, names: &[&str]) -> Result<i32, D::Error> {
    let code = match Option::<NumberOrString>::deserialize(deserializer)? {
        None => 0,
        Some(NumberOrString::Unsigned(n)) => i32::try_from(n).unwrap_or(0),
        Some(NumberOrString::Signed(n)) => i32::try_from(n).unwrap_or(0),
        Some(NumberOrString::Float(_)) => 0,
        Some(NumberOrString::Text(s)) => {
            let s = s.trim();
            match s.parse::<i32>() {
                Ok(n) => n,
                Err(_) => names
                    .iter()
                    .position(|name| name.eq_ignore_ascii_case(s))
                    .and_then(|i| i32::try_from(i).ok())
                    .unwrap_or(0),
            }
        }
    };

    if code < 0 || code as usize >= names.len() {
        Ok(0)
    } else {
        Ok(code)
    }
}

const SPAN_KIND_NAMES: [&str; 6] = [
    "SPAN_KIND_UNSPECIFIED",
    "SPAN_KIND_INTERNAL",
    "SPAN_KIND_SERVER",
    "SPAN_KIND_CLIENT",
    "SPAN_KIND_PRODUCER",
    "SPAN_KIND_CONSUMER",
];

const STATUS_CODE_NAMES: [&str; 3] = ["STATUS_CODE_UNSET", "STATUS_CODE_OK", "STATUS_CODE_ERROR"];

fn span_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    enum_code(deserializer, &SPAN_KIND_NAMES)
}

fn status_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    enum_code(deserializer, &STATUS_CODE_NAMES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_value_variants() {
        let attrs: Vec<KeyValue> = serde_json::from_value(json!([
            {"key": "s", "value": {"stringValue": "x"}},
            {"key": "i", "value": {"intValue": "42"}},
            {"key": "n", "value": {"intValue": 7}},
            {"key": "d", "value": {"doubleValue": 1.5}},
            {"key": "b", "value": {"boolValue": true}},
            {"key": "a", "value": {"arrayValue": {"values": [{"stringValue": "p"}, {"intValue": "1"}]}}},
            {"key": "k", "value": {"kvlistValue": {"values": [{"key": "inner", "value": {"boolValue": false}}]}}},
            {"key": "y", "value": {"bytesValue": "AQI="}},
            {"key": "z", "value": {}}
        ]))
        .unwrap();

        assert_eq!(attrs[0].value, AnyValue::String("x".to_string()));
        assert_eq!(attrs[1].value, AnyValue::Int(42));
        assert_eq!(attrs[2].value, AnyValue::Int(7));
        assert_eq!(attrs[3].value, AnyValue::Double(1.5));
        assert_eq!(attrs[8].value, AnyValue::Null);

        let map = attributes_to_map(attrs);
        assert_eq!(map["i"], json!(42));
        assert_eq!(map["b"], json!(true));
        assert_eq!(map["a"], json!(["p", 1]));
        assert_eq!(map["k"], json!({"inner": false}));
        assert_eq!(map["y"], json!("AQI="));
        assert_eq!(map["z"], serde_json::Value::Null);
    }

    #[test]
    fn test_span_kind_number_and_name_agree() {
        let by_name: Span = serde_json::from_value(json!({"kind": "SPAN_KIND_SERVER"})).unwrap();
        let by_number: Span = serde_json::from_value(json!({"kind": 2})).unwrap();
        assert_eq!(by_name.kind, 2);
        assert_eq!(by_number.kind, 2);

        let unknown: Span = serde_json::from_value(json!({"kind": "SPAN_KIND_BOGUS"})).unwrap();
        assert_eq!(unknown.kind, 0);
        let out_of_range: Span = serde_json::from_value(json!({"kind": 9})).unwrap();
        assert_eq!(out_of_range.kind, 0);
    }

    #[test]
    fn test_status_code_forms() {
        let status: Status =
            serde_json::from_value(json!({"code": "STATUS_CODE_ERROR", "message": "boom"})).unwrap();
        assert_eq!(status.code, 2);
        let status: Status = serde_json::from_value(json!({"code": 1})).unwrap();
        assert_eq!(status.code, 1);
        let status: Status = serde_json::from_value(json!({})).unwrap();
        assert_eq!(status.code, 0);
    }

    #[test]
    fn test_nanos_as_string_or_number() {
        let span: Span = serde_json::from_value(json!({
            "startTimeUnixNano": "1735689600000000000",
            "endTimeUnixNano": 1735689600000001000u64
        }))
        .unwrap();
        assert_eq!(span.end_time_unix_nano - span.start_time_unix_nano, 1_000);
    }

    #[test]
    fn test_legacy_scope_spans_are_merged() {
        let batch: ResourceSpans = serde_json::from_value(json!({
            "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "api"}}]},
            "scopeSpans": [{"spans": [{"spanId": "a"}]}],
            "instrumentationLibrarySpans": [{"spans": [{"spanId": "b"}, {"spanId": "c"}]}]
        }))
        .unwrap();

        let ids: Vec<&str> = batch
            .all_scope_spans()
            .flat_map(|s| s.spans.iter().map(|span| span.span_id.as_str()))
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(batch.service_name(), Some("api"));
    }

    #[test]
    fn test_resource_spans_alias() {
        let trace: TraceResponse =
            serde_json::from_value(json!({"resourceSpans": [{"scopeSpans": []}]})).unwrap();
        assert_eq!(trace.batches.len(), 1);
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(
            normalize_id("4BF92F3577B34DA6A3CE929D0E0E4736"),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        // 16 bytes, base64
        assert_eq!(
            normalize_id("S/kvNXezTaajzpKdDg5HNg=="),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        // 8 bytes, base64
        assert_eq!(normalize_id("APBnqgupArc="), "00f067aa0ba902b7");
        assert_eq!(normalize_id("not-an-id"), "not-an-id");
        assert_eq!(normalize_id(""), "");
    }

    #[test]
    fn test_search_trace_decodes() {
        let trace: SearchTrace = serde_json::from_value(json!({
            "traceID": "abc",
            "rootServiceName": "api",
            "rootTraceName": "GET /",
            "startTimeUnixNano": "1735689600000000000",
            "durationMs": 12,
            "spanSet": {"spans": [], "matched": 3}
        }))
        .unwrap();
        assert_eq!(trace.duration_ms, 12);
        assert_eq!(trace.span_set.unwrap().matched, 3);
        assert!(trace.span_sets.is_empty());
    }
}
