//! Observability query core
//!
//! ```text
//! HTTP envelope (handlers)
//!     ↓
//! ExplorerController ── query_parser
//!     ↓
//! ProviderRegistry (name → LogsClient | TracesClient | MetricsClient)
//!     ↓
//! providers: loki, tempo, prometheus
//! ```
//!
//! Everything above `providers` speaks only the neutral model in [`models`].

pub mod controller;
pub mod models;
pub mod ports;
pub mod providers;
pub mod query_parser;
pub mod registry;
pub mod wire;

pub use controller::{ExplorerController, QueryFailure, QueryOutcome, TimeWindow};
pub use models::{LogEntry, LogQuery, Trace, TraceQuery, TraceSpan, TraceSummary};
pub use ports::{LogsClient, MetricsClient, ProviderError, TracesClient};
pub use query_parser::{parse, DataSource, ParseError, ParsedQuery};
pub use registry::ProviderRegistry;
