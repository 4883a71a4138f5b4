//! Tempo trace store

mod adapter;
pub mod client;
pub mod otlp;

pub use adapter::{build_traceql, to_summaries, to_trace, TempoAdapter};
pub use client::TempoClient;
