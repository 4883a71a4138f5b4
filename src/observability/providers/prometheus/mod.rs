//! Prometheus metrics store (metadata only)

mod adapter;
pub mod client;

pub use adapter::PrometheusAdapter;
pub use client::PrometheusClient;
