//! Loki log store

mod adapter;
pub mod client;

pub use adapter::{build_selector, to_log_entries, LokiAdapter, CATCH_ALL_SELECTOR};
pub use client::LokiClient;
