use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::time::Duration;

use super::client::{TempoClient, VENDOR};
use super::otlp::{
    attributes_to_map, find_string, normalize_id, SearchResponse, SearchTrace, SpanSet,
    TraceResponse,
};
use crate::duration::format_duration;
use crate::observability::models::{
    timestamp_from_nanos, SpanLog, SpanReference, SpanStatus, Trace, TraceQuery, TraceSpan,
    TraceSummary, DEFAULT_LIMIT,
};
use crate::observability::ports::{ProviderError, TracesClient};
use crate::observability::query_parser::quote_selector_value;

/// [`TracesClient`] over Tempo
#[derive(Debug, Clone)]
pub struct TempoAdapter {
    client: TempoClient,
}

impl TempoAdapter {
    pub fn new(client: TempoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TracesClient for TempoAdapter {
    fn provider_type(&self) -> &str {
        VENDOR
    }

    async fn query_traces(&self, query: &TraceQuery) -> Result<Vec<TraceSummary>, ProviderError> {
        let traceql = build_traceql(query);
        let end = query.end.unwrap_or_else(Utc::now);
        let start = query.start.unwrap_or(end - chrono::Duration::hours(1));
        let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);

        let response = self
            .client
            .search(&traceql, start.timestamp(), end.timestamp(), limit)
            .await?;

        Ok(to_summaries(response))
    }

    async fn get_trace_detail(&self, trace_id: &str) -> Result<Trace, ProviderError> {
        let id = normalize_id(trace_id);
        // Dot segments would be resolved away by the URL parser even when escaped
        if id.is_empty() || id == "." || id == ".." {
            return Err(ProviderError::NotFound {
                vendor: VENDOR,
                what: format!("trace {}", trace_id),
            });
        }

        let response = self.client.trace_by_id(&id).await?;
        to_trace(trace_id, response)
    }

    async fn get_services(&self) -> Result<Vec<String>, ProviderError> {
        self.client.tag_values("service.name").await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.client.ready().await
    }
}

/// TraceQL span selector for a query; no conditions gives `{}`
pub fn build_traceql(query: &TraceQuery) -> String {
    let mut terms = Vec::new();

    if let Some(service) = query.service.as_deref().filter(|s| !s.is_empty()) {
        terms.push(format!(
            "resource.service.name={}",
            quote_selector_value(service)
        ));
    }
    if let Some(operation) = query.operation.as_deref().filter(|s| !s.is_empty()) {
        terms.push(format!("name={}", quote_selector_value(operation)));
    }
    for (key, value) in &query.tags {
        let attribute = if key.starts_with("span.") || key.starts_with("resource.") {
            key.clone()
        } else {
            format!("span.{}", key)
        };
        terms.push(format!("{}={}", attribute, quote_selector_value(value)));
    }
    if let Some(min) = query.min_duration {
        terms.push(format!("duration>={}", format_duration(min)));
    }
    if let Some(max) = query.max_duration {
        terms.push(format!("duration<={}", format_duration(max)));
    }

    format!("{{{}}}", terms.join(" && "))
}

/// Search results to summaries, in Tempo's order
pub fn to_summaries(response: SearchResponse) -> Vec<TraceSummary> {
    response.traces.into_iter().map(to_summary).collect()
}

fn to_summary(trace: SearchTrace) -> TraceSummary {
    // Newer Tempo repeats the first span set inside `spanSets`
    let sets: Vec<SpanSet> = if trace.span_sets.is_empty() {
        trace.span_set.into_iter().collect()
    } else {
        trace.span_sets
    };

    let span_count = sets
        .iter()
        .map(|set| {
            if set.matched > 0 {
                usize::try_from(set.matched).unwrap_or(usize::MAX)
            } else {
                set.spans.len()
            }
        })
        .fold(0usize, usize::saturating_add);

    let mut services: BTreeSet<String> = sets
        .iter()
        .flat_map(|set| set.spans.iter())
        .filter_map(|span| find_string(&span.attributes, "service.name"))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if services.is_empty() && !trace.root_service_name.is_empty() {
        services.insert(trace.root_service_name.clone());
    }

    TraceSummary {
        trace_id: normalize_id(&trace.trace_id),
        root_service: trace.root_service_name,
        root_operation: trace.root_trace_name,
        start_time: timestamp_from_nanos(trace.start_time_unix_nano),
        duration: Duration::from_millis(trace.duration_ms),
        span_count,
        services: services.into_iter().collect(),
    }
}

/// Materialize a trace-by-id response.
///
/// Spans keep the walk order batches, then scope spans, then spans. A
/// response without spans is `NotFound`.
pub fn to_trace(trace_id: &str, response: TraceResponse) -> Result<Trace, ProviderError> {
    let mut spans = Vec::new();

    for batch in &response.batches {
        let service_name = batch.service_name().unwrap_or_default().to_string();

        for scope in batch.all_scope_spans() {
            for span in &scope.spans {
                let span_trace_id = match normalize_id(&span.trace_id) {
                    id if id.is_empty() => trace_id.to_string(),
                    id => id,
                };
                let parent_span_id =
                    Some(normalize_id(&span.parent_span_id)).filter(|id| !id.is_empty());

                let logs = span
                    .events
                    .iter()
                    .map(|event| {
                        let mut fields = attributes_to_map(event.attributes.clone());
                        fields.insert(
                            "event".to_string(),
                            serde_json::Value::String(event.name.clone()),
                        );
                        SpanLog {
                            timestamp: timestamp_from_nanos(event.time_unix_nano),
                            fields,
                        }
                    })
                    .collect();

                let references = span
                    .links
                    .iter()
                    .map(|link| SpanReference {
                        ref_type: "FOLLOWS_FROM".to_string(),
                        trace_id: normalize_id(&link.trace_id),
                        span_id: normalize_id(&link.span_id),
                    })
                    .collect();

                spans.push(TraceSpan {
                    trace_id: span_trace_id,
                    span_id: normalize_id(&span.span_id),
                    parent_span_id,
                    operation_name: span.name.clone(),
                    service_name: service_name.clone(),
                    kind: span.kind,
                    start_time: timestamp_from_nanos(span.start_time_unix_nano),
                    duration: Duration::from_nanos(
                        span.end_time_unix_nano
                            .saturating_sub(span.start_time_unix_nano),
                    ),
                    tags: attributes_to_map(span.attributes.clone()),
                    status: SpanStatus {
                        code: span.status.code,
                        message: span.status.message.clone(),
                    },
                    logs,
                    references,
                });
            }
        }
    }

    Trace::from_spans(trace_id, spans).ok_or_else(|| ProviderError::NotFound {
        vendor: VENDOR,
        what: format!("trace {}", trace_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::providers::http::ProviderHttpClient;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(server: &MockServer) -> TempoAdapter {
        TempoAdapter::new(TempoClient::new(ProviderHttpClient::new(
            VENDOR,
            "tempo-test",
            reqwest::Client::new(),
            server.uri(),
            Duration::from_secs(5),
            None,
        )))
    }

    fn kv(key: &str, value: &str) -> serde_json::Value {
        json!({"key": key, "value": {"stringValue": value}})
    }

    fn two_batch_trace() -> serde_json::Value {
        json!({"batches": [
            {
                "resource": {"attributes": [kv("service.name", "api")]},
                "scopeSpans": [{"spans": [
                    {"traceId": "aa", "spanId": "01", "name": "GET /", "kind": "SPAN_KIND_SERVER",
                     "startTimeUnixNano": "1000", "endTimeUnixNano": "5000",
                     "attributes": [{"key": "http.status_code", "value": {"intValue": "200"}}],
                     "events": [{"timeUnixNano": "1500", "name": "cache miss",
                                 "attributes": [kv("key", "user:1")]}],
                     "status": {"code": 2, "message": "boom"}},
                    {"traceId": "aa", "spanId": "02", "parentSpanId": "01", "name": "auth",
                     "kind": 3, "startTimeUnixNano": "1200", "endTimeUnixNano": "1800"}
                ]}]
            },
            {
                "resource": {"attributes": [kv("service.name", "db")]},
                "instrumentationLibrarySpans": [{"spans": [
                    {"traceId": "aa", "spanId": "03", "parentSpanId": "02", "name": "SELECT",
                     "startTimeUnixNano": "1300", "endTimeUnixNano": "6000",
                     "links": [{"traceId": "bb", "spanId": "09"}]}
                ]}]
            }
        ]})
    }

    #[test]
    fn test_traceql_service_and_min_duration() {
        let query = TraceQuery {
            service: Some("s".to_string()),
            min_duration: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        assert_eq!(
            build_traceql(&query),
            r#"{resource.service.name="s" && duration>=100ms}"#
        );
    }

    #[test]
    fn test_traceql_all_terms() {
        let mut tags = BTreeMap::new();
        tags.insert("http.method".to_string(), "GET".to_string());
        tags.insert("resource.cluster".to_string(), "eu-1".to_string());
        let query = TraceQuery {
            operation: Some("GET /users".to_string()),
            tags,
            max_duration: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        assert_eq!(
            build_traceql(&query),
            r#"{name="GET /users" && span.http.method="GET" && resource.cluster="eu-1" && duration<=2s}"#
        );
    }

    #[test]
    fn test_traceql_empty_matches_all() {
        assert_eq!(build_traceql(&TraceQuery::default()), "{}");
    }

    #[test]
    fn test_three_spans_across_two_batches() {
        let response: TraceResponse = serde_json::from_value(two_batch_trace()).unwrap();
        let trace = to_trace("aa", response).unwrap();

        assert_eq!(trace.spans.len(), 3);
        assert_eq!(trace.services, vec!["api".to_string(), "db".to_string()]);
        assert_eq!(trace.start_time, timestamp_from_nanos(1000));
        assert_eq!(trace.duration, Duration::from_nanos(5000));

        let root = &trace.spans[0];
        assert_eq!(root.kind, 2);
        assert_eq!(root.duration, Duration::from_nanos(4000));
        assert_eq!(root.tags["http.status_code"], json!(200));
        assert!(root.status.is_error());
        assert_eq!(root.logs[0].fields["event"], json!("cache miss"));
        assert_eq!(root.logs[0].fields["key"], json!("user:1"));
        assert!(root.parent_span_id.is_none());

        let db = &trace.spans[2];
        assert_eq!(db.service_name, "db");
        assert_eq!(db.parent_span_id.as_deref(), Some("02"));
        assert_eq!(db.references[0].ref_type, "FOLLOWS_FROM");
        assert_eq!(db.references[0].trace_id, "bb");
    }

    #[test]
    fn test_trace_without_spans_is_not_found() {
        let response: TraceResponse = serde_json::from_value(json!({"batches": []})).unwrap();
        assert!(to_trace("aa", response).unwrap_err().is_not_found());
    }

    #[test]
    fn test_summary_services_and_span_count() {
        let response: SearchResponse = serde_json::from_value(json!({"traces": [
            {
                "traceID": "00AB", "rootServiceName": "api", "rootTraceName": "GET /",
                "startTimeUnixNano": "1735689600000000000", "durationMs": 250,
                "spanSet": {"matched": 4, "spans": [
                    {"spanID": "1", "attributes": [kv("service.name", "web")]},
                    {"spanID": "2", "attributes": [kv("service.name", "api")]},
                    {"spanID": "3", "attributes": [kv("service.name", "web")]}
                ]}
            },
            {
                "traceID": "00cd", "rootServiceName": "worker",
                "spanSets": [
                    {"matched": 1, "spans": [{"spanID": "4"}]},
                    {"spans": [{"spanID": "5"}, {"spanID": "6"}]}
                ]
            }
        ]}))
        .unwrap();

        let summaries = to_summaries(response);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].services, vec!["api".to_string(), "web".to_string()]);
        assert_eq!(summaries[0].span_count, 4);
        assert_eq!(summaries[0].duration, Duration::from_millis(250));
        assert_eq!(summaries[0].trace_id, "00ab");

        assert_eq!(summaries[1].span_count, 3);
        assert_eq!(summaries[1].services, vec!["worker".to_string()]);
    }

    #[tokio::test]
    async fn test_search_uses_unix_seconds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", r#"{resource.service.name="api"}"#))
            .and(query_param("start", "1735689600"))
            .and(query_param("end", "1735693200"))
            .and(query_param("limit", DEFAULT_LIMIT.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"traces": []})))
            .expect(1)
            .mount(&server)
            .await;

        let query = TraceQuery {
            service: Some("api".to_string()),
            start: Some("2025-01-01T00:00:00Z".parse().unwrap()),
            end: Some("2025-01-01T01:00:00Z".parse().unwrap()),
            ..Default::default()
        };
        let summaries = adapter_for(&server).query_traces(&query).await.unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn test_trace_detail_fetch_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/traces/00000000000000000000000000000aaa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(two_batch_trace()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/traces/0000000000000000000000000000dead"))
            .respond_with(ResponseTemplate::new(404).set_body_string("trace not found"))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let trace = adapter
            .get_trace_detail("00000000000000000000000000000AAA")
            .await
            .unwrap();
        assert_eq!(trace.trace_id, "00000000000000000000000000000AAA");
        assert_eq!(trace.spans.len(), 3);

        let err = adapter
            .get_trace_detail("0000000000000000000000000000dead")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_non_hex_trace_ids_are_fetched_verbatim() {
        let server = MockServer::start().await;
        let start = 1_735_689_600_000_000_000u64;
        Mock::given(method("GET"))
            .and(path("/api/traces/T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batches": [{
                "resource": {"attributes": []},
                "scopeSpans": [{"spans": [{
                    "traceId": "T1", "spanId": "S1", "name": "root",
                    "startTimeUnixNano": start.to_string(),
                    "endTimeUnixNano": (start + 1_000).to_string()
                }]}]
            }]})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/traces/a%2Fb"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let trace = adapter.get_trace_detail("T1").await.unwrap();
        assert_eq!(trace.trace_id, "T1");
        assert_eq!(trace.spans.len(), 1);

        let err = adapter.get_trace_detail("a/b").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_blank_or_dot_trace_id_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        for id in ["", "  ", "..", "."] {
            let err = adapter.get_trace_detail(id).await.unwrap_err();
            assert!(err.is_not_found(), "{:?}", id);
        }
    }

    #[tokio::test]
    async fn test_services_from_tag_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search/tag/service.name/values"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"tagValues": ["api", "db"]})),
            )
            .mount(&server)
            .await;

        let services = adapter_for(&server).get_services().await.unwrap();
        assert_eq!(services, vec!["api", "db"]);
    }
}
