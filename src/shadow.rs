//! Shadow evaluation
//!
//! Runs a candidate classifier against live traffic after the primary
//! decision is already final. The candidate sees the same request, its
//! verdict is compared and counted, and nothing else happens: no candidate
//! outcome, error, or panic can reach the caller. This is how a new model
//! or prompt earns trust before a promotion.

use crate::classifier::IntentClassifier;
use crate::decision::Classification;
use crate::observability::metrics::metrics;
use crate::request::RouteRequest;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ShadowEvaluator {
    candidate: Arc<dyn IntentClassifier>,
}

impl ShadowEvaluator {
    pub fn new(candidate: Arc<dyn IntentClassifier>) -> Self {
        Self { candidate }
    }

    /// Compare the candidate against the primary outcome in the background
    ///
    /// Returns as soon as the task is spawned; the caller never waits on
    /// the candidate.
    pub fn evaluate(&self, request: &RouteRequest, primary: &Classification) {
        let candidate = Arc::clone(&self.candidate);
        let request = request.clone();
        let primary = primary.clone();

        tokio::spawn(async move {
            metrics().shadow_run();
            let name = candidate.name().to_string();

            // Inner spawn isolates candidate panics from this comparison task
            let outcome =
                tokio::spawn(async move { candidate.classify(&request).await }).await;

            match outcome {
                Ok(Ok(shadow)) => {
                    if shadow.intent == primary.intent && shadow.complexity == primary.complexity {
                        debug!(candidate = %name, intent = %shadow.intent, "Shadow agreed");
                    } else {
                        metrics().shadow_disagreement();
                        info!(
                            candidate = %name,
                            primary_intent = %primary.intent,
                            shadow_intent = %shadow.intent,
                            primary_complexity = %primary.complexity,
                            shadow_complexity = %shadow.complexity,
                            "Shadow disagreed"
                        );
                    }
                }
                Ok(Err(error)) => {
                    metrics().shadow_failure();
                    debug!(candidate = %name, error = %error, "Shadow candidate failed");
                }
                Err(join_error) => {
                    metrics().shadow_failure();
                    debug!(candidate = %name, error = %join_error, "Shadow candidate panicked");
                }
            }
        });
    }
}
