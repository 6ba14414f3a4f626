//! Observability for the request router
//!
//! Structured logging and in-process metrics. Everything stays on the local
//! machine; there is no exporter and no network listener here.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{metrics, MetricsSnapshot, RouterMetrics};
