//! Incoming request representation
//!
//! A `RouteRequest` is a value object: built once when the message arrives
//! and never mutated by the pipeline. All stages key off the normalized form
//! of the message so that cosmetic variation (case, surrounding whitespace)
//! cannot split cache entries or corpus matches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One user message awaiting a routing decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteRequest {
    /// Raw message text as typed by the user
    pub message: String,
    /// Optional recent-dialog snippet supplied by the orchestrator
    pub context_snippet: Option<String>,
    /// Session the message belongs to
    pub session_id: Uuid,
    /// Arrival timestamp
    pub received_at: DateTime<Utc>,
}

impl RouteRequest {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            context_snippet: None,
            session_id: Uuid::new_v4(),
            received_at: Utc::now(),
        }
    }

    pub fn with_context<S: Into<String>>(mut self, snippet: S) -> Self {
        self.context_snippet = Some(snippet.into());
        self
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    /// Normalized form used for cache keys, matching, and digests
    pub fn normalized(&self) -> String {
        normalize(&self.message)
    }

    /// Stable correlation key for traces, feedback, and learning
    ///
    /// Deliberately excludes the system version: feedback may arrive after a
    /// version bump and must still find the trace it belongs to.
    pub fn digest(&self) -> RequestDigest {
        RequestDigest::of_message(&self.message)
    }
}

/// Lowercase (Unicode-aware) and trim; no other rewriting
pub fn normalize(message: &str) -> String {
    message.trim().to_lowercase()
}

/// SHA-256 hex digest of a normalized message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestDigest(String);

impl RequestDigest {
    pub fn of_message(message: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize(message).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed digest, e.g. one echoed back by a client
    pub fn from_raw(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
