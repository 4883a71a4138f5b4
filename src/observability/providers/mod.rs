//! Vendor adapters behind the neutral ports

pub mod http;
pub mod loki;
pub mod prometheus;
pub mod tempo;

pub use http::{ProviderAuth, ProviderHttpClient};
pub use loki::LokiAdapter;
pub use prometheus::PrometheusAdapter;
pub use tempo::TempoAdapter;
