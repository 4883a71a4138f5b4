use ops_dashboard::config::{load_config, AuthType};
use ops_dashboard::observability::ProviderRegistry;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_yaml(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const FULL: &str = r#"
server:
  host: 127.0.0.1
  port: 9090
  log_level: debug
  log_format: json
  request_timeout: 45s
  cors_allowed_origins: ["http://localhost:5173"]

api_keys:
  - key: sk-dashboard-ui-000001
    name: ui
    enabled: true

observability:
  enabled: true
  trace_fetch_concurrency: 6
  logs:
    - name: loki-main
      type: loki
      url: http://loki:3100
      timeout: 10s
      auth:
        type: basic
        username: grafana
        password: secret
    - name: loki-archive
      type: loki
      url: http://loki-archive:3100
      enabled: false
  traces:
    - name: tempo-main
      type: tempo
      url: http://tempo:3200
      auth:
        type: bearer
        token: glsa_token
  metrics:
    - name: prom
      type: prometheus
      url: http://prometheus:9090

metrics:
  enabled: true
  endpoint: /internal/metrics
"#;

#[test]
fn test_full_yaml_config_loads() {
    let file = write_yaml(FULL);
    let cfg = load_config(file.path()).unwrap();

    assert_eq!(cfg.server.port, 9090);
    assert_eq!(cfg.server.log_format, "json");
    assert_eq!(cfg.server.request_timeout, Duration::from_secs(45));
    assert_eq!(cfg.server.cors_allowed_origins, vec!["http://localhost:5173"]);
    assert_eq!(cfg.observability.trace_fetch_concurrency, 6);

    let loki = &cfg.observability.logs[0];
    assert_eq!(loki.timeout, Duration::from_secs(10));
    let auth = loki.auth.as_ref().unwrap();
    assert_eq!(auth.auth_type, AuthType::Basic);
    assert_eq!(auth.username.as_deref(), Some("grafana"));

    // Defaults
    assert!(cfg.observability.logs[0].enabled);
    assert!(!cfg.observability.logs[1].enabled);
    assert_eq!(cfg.observability.traces[0].timeout, Duration::from_secs(30));
    assert_eq!(cfg.metrics.endpoint, "/internal/metrics");
}

#[test]
fn test_registry_skips_disabled_providers() {
    let file = write_yaml(FULL);
    let cfg = load_config(file.path()).unwrap();

    let registry =
        ProviderRegistry::from_config(&cfg.observability, reqwest::Client::new()).unwrap();
    let listing = registry.listing();

    assert_eq!(listing.logs, vec!["loki-main"]);
    assert_eq!(listing.traces, vec!["tempo-main"]);
    assert_eq!(listing.metrics, vec!["prom"]);
    assert!(registry.logs("loki-archive").is_none());
}

#[test]
fn test_minimal_config_uses_defaults() {
    let file = write_yaml(
        r#"
server:
  log_level: info
api_keys:
  - key: sk-dashboard-min-000001
    name: ui
    enabled: true
observability:
  enabled: true
"#,
    );
    let cfg = load_config(file.path()).unwrap();

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.request_timeout, Duration::from_secs(60));
    assert_eq!(cfg.observability.trace_fetch_concurrency, 8);
    assert!(cfg.observability.logs.is_empty());
    assert!(cfg.metrics.enabled);
    assert_eq!(cfg.metrics.endpoint, "/metrics");
}

#[test]
fn test_disabled_observability_is_rejected() {
    let file = write_yaml(
        r#"
server:
  log_level: info
api_keys:
  - key: sk-dashboard-min-000001
    name: ui
    enabled: true
observability:
  enabled: false
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("observability module is disabled"));
}

#[test]
fn test_wrong_vendor_for_kind_is_rejected() {
    let file = write_yaml(
        r#"
server:
  log_level: info
api_keys:
  - key: sk-dashboard-min-000001
    name: ui
    enabled: true
observability:
  enabled: true
  logs:
    - name: tempo-as-logs
      type: tempo
      url: http://tempo:3200
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("unsupported type 'tempo'"));
}

#[test]
fn test_bad_duration_is_rejected() {
    let file = write_yaml(
        r#"
server:
  request_timeout: soon
api_keys:
  - key: sk-dashboard-min-000001
    name: ui
    enabled: true
observability:
  enabled: true
"#,
    );
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_config(&dir.path().join("absent.yaml")).is_err());
}
