//! Classification stages
//!
//! Two classifiers sit behind one trait: the external LLM call and the
//! lexical fallback. The router tries them in order; the shadow evaluator
//! reuses the same trait for candidate versions.
//!
//! Confidence tiers are fixed so stages compose: fallback output is capped
//! at [`FALLBACK_CONFIDENCE_CEILING`], the classifier floor sits just above
//! it, and semantic thresholds start higher still. A decision made by a
//! cheaper stage can therefore always be outranked by a real classification
//! after the next version bump.

pub mod heuristic;
pub mod llm;
pub mod schema;

pub use heuristic::HeuristicClassifier;
pub use llm::LlmClassifier;
pub use schema::ClassifierOutput;

use crate::decision::Classification;
use crate::request::RouteRequest;
use async_trait::async_trait;
use thiserror::Error;

/// Upper bound on fallback confidence
pub const FALLBACK_CONFIDENCE_CEILING: f32 = 0.60;

/// Lower bound on accepted classifier confidence; keeps the classifier tier
/// strictly above the fallback ceiling
pub const CLASSIFIER_CONFIDENCE_FLOOR: f32 = 0.65;

/// Classification stage errors; the router degrades, never propagates
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classification timed out after {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Malformed classifier output: {message}")]
    MalformedOutput { message: String },
}

impl ClassifyError {
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn malformed_output<S: Into<String>>(message: S) -> Self {
        Self::MalformedOutput {
            message: message.into(),
        }
    }
}

/// A pipeline stage that can turn a request into a classification
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Name for logs and shadow comparison records
    fn name(&self) -> &str;

    async fn classify(&self, request: &RouteRequest) -> Result<Classification, ClassifyError>;
}
