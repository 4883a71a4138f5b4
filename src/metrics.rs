use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and describe the core's metrics
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    init_metric_descriptions();

    Ok(handle)
}

/// Describe all metrics (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "explorer_queries_total",
        "Total number of explorer queries by data source, provider and outcome"
    );
    describe_histogram!(
        "explorer_query_duration_seconds",
        "Explorer query execution time in seconds"
    );
    describe_counter!(
        "provider_requests_total",
        "Total number of outbound provider HTTP requests"
    );
    describe_gauge!("ops_dashboard_info", "Build information");

    gauge!("ops_dashboard_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a finished explorer query
pub fn record_query(data_source: &str, provider: &str, outcome: &str, duration: Duration) {
    counter!(
        "explorer_queries_total",
        "data_source" => data_source.to_string(),
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);

    histogram!(
        "explorer_query_duration_seconds",
        "data_source" => data_source.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record one outbound provider exchange; `kind` is the vendor type
pub fn record_provider_request(kind: &str, provider: &str, outcome: &str) {
    counter!(
        "provider_requests_total",
        "provider" => provider.to_string(),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn series<'a>(rendered: &'a str, name: &str) -> Vec<&'a str> {
        rendered
            .lines()
            .filter(|line| line.starts_with(&format!("{}{{", name)))
            .collect()
    }

    #[test]
    fn test_record_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            init_metric_descriptions();
            record_query("logs", "loki-main", "success", Duration::from_millis(12));
            record_query("logs", "loki-main", "success", Duration::from_millis(30));
            record_query("traces", "tempo-main", "upstream_error", Duration::from_secs(1));
            record_provider_request("loki", "loki-main", "success");
        });

        let rendered = handle.render();

        let queries = series(&rendered, "explorer_queries_total");
        assert_eq!(queries.len(), 2, "{}", rendered);
        assert!(queries.iter().any(|line| line.contains(r#"data_source="logs""#)
            && line.contains(r#"provider="loki-main""#)
            && line.contains(r#"outcome="success""#)
            && line.ends_with(" 2")));
        assert!(queries.iter().any(|line| line.contains(r#"data_source="traces""#)
            && line.contains(r#"provider="tempo-main""#)
            && line.contains(r#"outcome="upstream_error""#)
            && line.ends_with(" 1")));

        let requests = series(&rendered, "provider_requests_total");
        assert_eq!(requests.len(), 1, "{}", rendered);
        assert!(requests[0].contains(r#"provider="loki-main""#));
        assert!(requests[0].contains(r#"kind="loki""#));
        assert!(requests[0].contains(r#"outcome="success""#));

        assert!(rendered.contains("explorer_query_duration_seconds"));
        assert!(series(&rendered, "ops_dashboard_info")
            .iter()
            .any(|line| line.contains(env!("CARGO_PKG_VERSION"))));
    }
}
