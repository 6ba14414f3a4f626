//! Structured logging built on the tracing crate
//!
//! The `run` subcommand owns stdout for the decision stream, one JSON
//! object per line, so every log line goes to stderr regardless of format.
//! A local install can then be debugged from its log stream without
//! disturbing whatever consumes the decisions.
//!
//! Configuration comes from the environment:
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE (default INFO)
//! - `LOG_FORMAT`: `json`, `pretty` or `compact` (default json)
//! - `LOG_SPANS`: emit span open/close events when `true` (default false)
//! - `RUST_LOG`: full filter override in env_logger syntax
//!
//! ```bash
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG ./switchboard run
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose chatter would drown the router's own events at INFO
const QUIET_DEPENDENCIES: [&str; 3] = ["hyper", "reqwest", "tokio"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for aggregation
    Json,
    /// Multi-line, colored, for development
    Pretty,
    /// Single-line, colored, for a terminal
    Compact,
}

impl LogFormat {
    /// Unknown values fall back to JSON so a typo never breaks aggregation
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

fn base_filter(level: Level) -> EnvFilter {
    if let Ok(custom) = env::var("RUST_LOG") {
        return EnvFilter::new(custom);
    }
    let mut filter = EnvFilter::new(level.to_string());
    for dependency in QUIET_DEPENDENCIES {
        filter = filter.add_directive(format!("{dependency}=warn").parse().unwrap());
    }
    filter
}

fn span_events(include_spans: bool) -> FmtSpan {
    if include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Install the global subscriber with explicit settings
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let registry = tracing_subscriber::registry().with(base_filter(level));
    let spans = span_events(include_spans);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(spans),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_writer(std::io::stderr)
                    .with_span_events(spans),
            )
            .init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_span_events(spans),
            )
            .init(),
    }
}

/// Install the global subscriber from `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS`
pub fn init_default_logging() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|raw| raw.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let format = LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default());

    let include_spans = env::var("LOG_SPANS")
        .map(|raw| raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    init_logging(level, format, include_spans);
}
