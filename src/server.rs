use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    auth,
    config::Config,
    handlers::{self, observability_api::ObservabilityState},
    metrics,
    observability::{ExplorerController, ProviderRegistry},
    signals::setup_signal_handlers,
};

/// Start the dashboard API server
///
/// This function:
/// 1. Initializes metrics
/// 2. Builds the provider registry and explorer controller from configuration
/// 3. Sets up signal handlers for graceful shutdown
/// 4. Binds to the configured address and serves until shutdown
pub async fn start_server(config: Config) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(Arc::new(metrics::init_metrics()?))
    } else {
        None
    };

    let http_client = reqwest::Client::builder()
        .user_agent(concat!("ops-dashboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let registry = ProviderRegistry::from_config(&config.observability, http_client)?;
    if registry.is_empty() {
        warn!("No enabled providers configured; every query will fail with provider-not-found");
    }
    let listing = registry.listing();

    let controller = Arc::new(ExplorerController::new(
        Arc::new(registry),
        config.observability.trace_fetch_concurrency,
    ));

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("Invalid server.host '{}'", config.server.host))?,
        config.server.port,
    ));

    let config = Arc::new(config);
    let app = create_router(config.clone(), controller, metrics_handle);

    info!("Starting ops-dashboard on {}", addr);
    info!(
        "Configuration: {} API keys, providers: logs={:?} traces={:?} metrics={:?}",
        config.api_keys.len(),
        listing.logs,
        listing.traces,
        listing.metrics
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    config: Arc<Config>,
    controller: Arc<ExplorerController>,
    metrics_handle: Option<Arc<PrometheusHandle>>,
) -> Router {
    // Deadline is applied per handler so a timeout still answers with the envelope
    let state = ObservabilityState {
        controller,
        request_timeout: config.server.request_timeout,
    };

    use handlers::observability_api as api;

    // Authenticated observability API
    let observability_routes = Router::new()
        .route("/observability/query", post(api::explorer_query))
        .route("/observability/logs/labels", get(api::log_labels))
        .route("/observability/logs/levels", get(api::log_levels))
        .route("/observability/traces/services", get(api::trace_services))
        .route("/observability/traces/:trace_id", get(api::trace_detail))
        .route("/observability/metrics/names", get(api::metric_names))
        .route("/observability/providers", get(api::list_providers))
        .route("/observability/providers/health", get(api::providers_health))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth::auth_middleware,
        ))
        .with_state(state.clone());

    let mut app = Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .with_state(state)
        .merge(observability_routes);

    if let Some(handle) = metrics_handle {
        app = app.merge(
            Router::new()
                .route(
                    &config.metrics.endpoint,
                    get(handlers::metrics_handler::metrics),
                )
                .with_state(handle),
        );
    }

    app.layer(cors_layer(&config.server.cors_allowed_origins))
        // Explorer requests are small; 1MB is plenty
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
}

/// `["*"]` allows any origin; an empty list adds no CORS headers
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
