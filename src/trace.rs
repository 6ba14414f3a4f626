//! Routing trace log
//!
//! Every routed request leaves one record: what came in (as a digest, never
//! the raw text), what the pipeline decided, which stage decided it, and how
//! long it took. Feedback arrives later and is appended as its own record
//! keyed by the same digest, keeping the log strictly append-only.
//!
//! Trace writes happen off the request path. A failed write is logged and
//! counted, never surfaced to the caller.

use crate::decision::{ComplexityTier, ConfidenceScore, IntentLabel, ResolverStage, RoutingDecision};
use crate::request::RequestDigest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Errors from trace persistence
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Trace write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trace encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Operator feedback on a routed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceFeedback {
    /// The routing was right
    Positive,
    /// The routing was wrong, correct label unknown
    Negative,
    /// The routing was wrong and this is the right label
    Corrected { intent: IntentLabel },
}

/// One routed request as logged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTrace {
    pub request_digest: RequestDigest,
    pub intent: IntentLabel,
    pub complexity: ComplexityTier,
    pub confidence: ConfidenceScore,
    pub resolved_by: ResolverStage,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl RoutingTrace {
    pub fn from_decision(
        request_digest: RequestDigest,
        decision: &RoutingDecision,
        latency_ms: u64,
    ) -> Self {
        Self {
            request_digest,
            intent: decision.intent.clone(),
            complexity: decision.complexity,
            confidence: decision.confidence,
            resolved_by: decision.resolved_by,
            latency_ms,
            recorded_at: Utc::now(),
        }
    }
}

/// A line in the trace log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum TraceRecord {
    Route(RoutingTrace),
    Feedback {
        request_digest: RequestDigest,
        feedback: TraceFeedback,
        recorded_at: DateTime<Utc>,
    },
}

/// Destination for trace records
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn append(&self, trace: RoutingTrace) -> Result<(), TraceError>;

    async fn record_feedback(
        &self,
        digest: &RequestDigest,
        feedback: TraceFeedback,
    ) -> Result<(), TraceError>;
}

/// Append-only JSONL sink, one record per line
pub struct JsonlTraceSink {
    path: PathBuf,
    // Serializes writers so concurrent records cannot interleave mid-line
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlTraceSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append_record(&self, record: &TraceRecord) -> Result<(), TraceError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl TraceSink for JsonlTraceSink {
    async fn append(&self, trace: RoutingTrace) -> Result<(), TraceError> {
        self.append_record(&TraceRecord::Route(trace)).await
    }

    async fn record_feedback(
        &self,
        digest: &RequestDigest,
        feedback: TraceFeedback,
    ) -> Result<(), TraceError> {
        self.append_record(&TraceRecord::Feedback {
            request_digest: digest.clone(),
            feedback,
            recorded_at: Utc::now(),
        })
        .await
    }
}

/// Spawns trace writes so the request path never waits on disk
#[derive(Clone)]
pub struct TraceRecorder {
    sink: Arc<dyn TraceSink>,
}

impl TraceRecorder {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink }
    }

    /// Write a route record in the background
    pub fn record(&self, trace: RoutingTrace) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(error) = sink.append(trace).await {
                crate::observability::metrics::metrics().trace_write_failed();
                warn!(error = %error, "Trace write failed");
            }
        });
    }

    /// Write a feedback record; errors are logged, never returned
    pub async fn record_feedback(&self, digest: &RequestDigest, feedback: TraceFeedback) {
        if let Err(error) = self.sink.record_feedback(digest, feedback).await {
            crate::observability::metrics::metrics().trace_write_failed();
            warn!(error = %error, "Feedback write failed");
        }
    }
}
