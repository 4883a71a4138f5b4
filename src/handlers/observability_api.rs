//! Observability HTTP API handlers
//!
//! Every response uses the `{success, error?, data}` envelope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::duration::format_duration;
use crate::error::AppError;
use crate::observability::models::Trace;
use crate::observability::query_parser;
use crate::observability::wire::{
    ApiResponse, ExplorerQueryData, ExplorerQueryRequest, ProviderHealth, ProviderParam,
    ProvidersListing, QueryResults,
};
use crate::observability::ExplorerController;

/// Shared state for observability API
#[derive(Clone)]
pub struct ObservabilityState {
    pub controller: Arc<ExplorerController>,
    /// Deadline for a single API request, including every upstream call it makes
    pub request_timeout: Duration,
}

impl ObservabilityState {
    fn deadline_error(&self, source: &'static str) -> AppError {
        AppError::UpstreamTimeout {
            source,
            message: format!(
                "request exceeded {}",
                format_duration(self.request_timeout)
            ),
        }
    }

    /// Run a metadata call under the request deadline
    async fn within_deadline<T, F>(&self, source: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(self.deadline_error(source)),
        }
    }
}

/// POST /observability/query - Explorer query
///
/// Example body: `{"query":"FROM Logs WHERE service=\"auth\"","provider":"loki-main"}`
pub async fn explorer_query(
    State(state): State<ObservabilityState>,
    payload: Result<Json<ExplorerQueryRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return AppError::InvalidArgument(rejection.body_text())
                .with_data(ExplorerQueryData::default())
                .into_response();
        }
    };

    let (from, to) = request.time_range();
    let started = Instant::now();

    let execution = tokio::time::timeout(
        state.request_timeout,
        state
            .controller
            .execute(&request.query, from, to, &request.provider),
    )
    .await;

    let execution = match execution {
        Ok(execution) => execution,
        Err(_) => {
            let data_source = query_parser::parse(&request.query)
                .ok()
                .map(|parsed| parsed.data_source.as_str());
            tracing::warn!(
                query = %request.query,
                provider = %request.provider,
                timeout = %format_duration(state.request_timeout),
                "Explorer query exceeded request deadline"
            );
            return state
                .deadline_error(data_source.unwrap_or("explorer"))
                .with_data(ExplorerQueryData {
                    data_source: data_source.unwrap_or_default().to_string(),
                    results: QueryResults::Empty,
                    total: 0,
                    query: request.query,
                    execution_time_ms: u64::try_from(started.elapsed().as_millis())
                        .unwrap_or(u64::MAX),
                })
                .into_response();
        }
    };

    match execution {
        Ok(outcome) => Json(ApiResponse::ok(ExplorerQueryData {
            data_source: outcome.data_source.as_str().to_string(),
            results: outcome.results,
            total: outcome.total,
            query: request.query,
            execution_time_ms: outcome.execution_time_ms,
        }))
        .into_response(),
        Err(failure) => failure
            .error
            .with_data(ExplorerQueryData {
                data_source: failure
                    .data_source
                    .map(|ds| ds.as_str().to_string())
                    .unwrap_or_default(),
                results: QueryResults::Empty,
                total: 0,
                query: request.query,
                execution_time_ms: failure.execution_time_ms,
            })
            .into_response(),
    }
}

/// GET /observability/logs/labels
pub async fn log_labels(
    State(state): State<ObservabilityState>,
    Query(params): Query<ProviderParam>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let labels = state
        .within_deadline("logs", state.controller.log_labels(params.provider.as_deref()))
        .await?;
    Ok(Json(ApiResponse::ok(labels)))
}

/// GET /observability/logs/levels
pub async fn log_levels(
    State(state): State<ObservabilityState>,
    Query(params): Query<ProviderParam>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let levels = state
        .within_deadline("logs", state.controller.log_levels(params.provider.as_deref()))
        .await?;
    Ok(Json(ApiResponse::ok(levels)))
}

/// GET /observability/traces/services
pub async fn trace_services(
    State(state): State<ObservabilityState>,
    Query(params): Query<ProviderParam>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let services = state
        .within_deadline("traces", state.controller.trace_services(params.provider.as_deref()))
        .await?;
    Ok(Json(ApiResponse::ok(services)))
}

/// GET /observability/traces/:trace_id
pub async fn trace_detail(
    State(state): State<ObservabilityState>,
    Path(trace_id): Path<String>,
    Query(params): Query<ProviderParam>,
) -> Result<Json<ApiResponse<Trace>>, AppError> {
    let trace = state
        .within_deadline("traces", state.controller.trace_detail(&trace_id, params.provider.as_deref()))
        .await?;
    Ok(Json(ApiResponse::ok(trace)))
}

/// GET /observability/metrics/names
pub async fn metric_names(
    State(state): State<ObservabilityState>,
    Query(params): Query<ProviderParam>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let names = state
        .within_deadline("metrics", state.controller.metric_names(params.provider.as_deref()))
        .await?;
    Ok(Json(ApiResponse::ok(names)))
}

/// GET /observability/providers
pub async fn list_providers(
    State(state): State<ObservabilityState>,
) -> Json<ApiResponse<ProvidersListing>> {
    Json(ApiResponse::ok(state.controller.providers()))
}

/// GET /observability/providers/health - always 200, per-provider status in the body
pub async fn providers_health(
    State(state): State<ObservabilityState>,
) -> Json<ApiResponse<Vec<ProviderHealth>>> {
    Json(ApiResponse::ok(state.controller.provider_health().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::ProviderRegistry;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = ObservabilityState {
            controller: Arc::new(ExplorerController::new(
                Arc::new(ProviderRegistry::new()),
                1,
            )),
            request_timeout: Duration::from_secs(5),
        };
        Router::new()
            .route("/observability/query", post(explorer_query))
            .with_state(state)
    }

    async fn post_query(body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/observability/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_argument() {
        let (status, body) = post_query("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("invalid argument"));
        assert_eq!(body["data"]["results"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_error_shell_echoes_query() {
        let (status, body) = post_query(r#"{"query":"SELECT 1","provider":"x"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["query"], "SELECT 1");
        assert_eq!(body["data"]["data_source"], "");
        assert_eq!(body["data"]["total"], 0);
    }

    #[tokio::test]
    async fn test_missing_provider_is_bad_request() {
        let (status, body) = post_query(r#"{"query":"FROM Traces"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid argument: provider is required");
        assert_eq!(body["data"]["data_source"], "traces");
    }

    #[tokio::test]
    async fn test_numeric_time_bound_still_resolves_provider() {
        let (status, body) = post_query(
            r#"{"query":"FROM Logs","provider":"loki-main","time_range_from":1735689600}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["data"]["data_source"], "logs");
        assert!(body["error"].as_str().unwrap().contains("loki-main"));
    }
}
