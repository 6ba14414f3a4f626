//! Request routing pipeline
//!
//! [`RequestRouter`] threads one message through the tiers in cost order:
//! guardrail, cache, semantic matcher, external classifier, lexical
//! fallback, then policy synthesis. Classification can degrade tier by
//! tier but `classify` itself never fails: some stage always produces a
//! decision. Shadow evaluation and trace writes run out of band and can
//! neither delay nor change the result.

use crate::cache::{CacheKey, DecisionCache};
use crate::classifier::heuristic::{estimate_complexity, HeuristicClassifier};
use crate::classifier::llm::LlmClassifier;
use crate::classifier::{ClassifyError, IntentClassifier};
use crate::config::RouterConfig;
use crate::corpus::ExampleCorpus;
use crate::decision::{
    Classification, ComplexityTier, ConfidenceScore, IntentLabel, ResolverStage, RoutingDecision,
};
use crate::embedding::Embedder;
use crate::error::{RouterError, RouterResult};
use crate::guardrail::{GuardrailFilter, GuardrailVerdict};
use crate::llm::provider::LlmProvider;
use crate::observability::metrics::metrics;
use crate::policy::PolicySynthesizer;
use crate::request::{RequestDigest, RouteRequest};
use crate::semantic::{SemanticMatcher, SemanticOutcome, SemanticThresholds};
use crate::shadow::ShadowEvaluator;
use crate::trace::{RoutingTrace, TraceFeedback, TraceRecorder, TraceSink};
use crate::version::VersionMarker;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

// Classifier-resolved requests kept around awaiting feedback
const LEARNING_QUEUE_CAP: usize = 256;

struct LearningCandidate {
    text: String,
    intent: IntentLabel,
}

#[derive(Default)]
struct PendingLearning {
    by_digest: HashMap<RequestDigest, LearningCandidate>,
    order: VecDeque<RequestDigest>,
}

impl PendingLearning {
    fn remember(&mut self, digest: RequestDigest, candidate: LearningCandidate) {
        if self.by_digest.insert(digest.clone(), candidate).is_none() {
            self.order.push_back(digest);
            if self.order.len() > LEARNING_QUEUE_CAP {
                if let Some(oldest) = self.order.pop_front() {
                    self.by_digest.remove(&oldest);
                }
            }
        }
    }

    fn take(&mut self, digest: &RequestDigest) -> Option<LearningCandidate> {
        let candidate = self.by_digest.remove(digest)?;
        self.order.retain(|queued| queued != digest);
        Some(candidate)
    }
}

/// The routing pipeline, assembled from configuration
pub struct RequestRouter {
    guardrail: GuardrailFilter,
    cache: DecisionCache,
    matcher: SemanticMatcher,
    classifier: Option<LlmClassifier>,
    fallback: HeuristicClassifier,
    synthesizer: PolicySynthesizer,
    shadow: Option<ShadowEvaluator>,
    recorder: TraceRecorder,
    version: VersionMarker,
    pending_learning: Mutex<PendingLearning>,
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter").finish_non_exhaustive()
    }
}

impl RequestRouter {
    /// Build the pipeline. Fails fast: a malformed guardrail pattern, a
    /// missing or corrupt corpus, or an unreadable version marker refuses
    /// to start.
    pub fn new(
        config: &RouterConfig,
        provider: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        trace_sink: Arc<dyn TraceSink>,
    ) -> RouterResult<Self> {
        config.validate()?;

        let guardrail = GuardrailFilter::new(&config.guardrail)?;
        let cache = DecisionCache::new(config.cache.capacity);
        let corpus = Arc::new(ExampleCorpus::load(&config.corpus_path())?);
        let matcher = SemanticMatcher::new(
            embedder,
            Arc::clone(&corpus),
            SemanticThresholds::from_config(&config.semantic),
        );
        let version = VersionMarker::load_or_init(config.version_path())?;

        let classifier = config
            .classifier
            .enabled
            .then(|| LlmClassifier::new(Arc::clone(&provider), &config.classifier));

        let shadow = if config.shadow.enabled {
            let candidate = LlmClassifier::new(Arc::clone(&provider), &config.classifier);
            let candidate = match &config.shadow.model {
                Some(model) => candidate.with_model(model.clone()),
                None => candidate,
            };
            Some(ShadowEvaluator::new(Arc::new(candidate)))
        } else {
            None
        };

        info!(
            corpus_items = corpus.len_active(),
            version = version.current(),
            cache_capacity = config.cache.capacity,
            classifier_enabled = classifier.is_some(),
            shadow_enabled = shadow.is_some(),
            "Request router ready"
        );

        Ok(Self {
            guardrail,
            cache,
            matcher,
            classifier,
            fallback: HeuristicClassifier::new(),
            synthesizer: PolicySynthesizer::new(),
            shadow,
            recorder: TraceRecorder::new(trace_sink),
            version,
            pending_learning: Mutex::new(PendingLearning::default()),
        })
    }

    /// Route one message to a decision. Never fails: every tier that can
    /// error has a cheaper tier behind it.
    #[tracing::instrument(name = "route_request", skip(self, request))]
    pub async fn classify(&self, request: &RouteRequest) -> RoutingDecision {
        let started = Instant::now();
        metrics().request_received();

        let normalized = request.normalized();
        let digest = RequestDigest::of_message(&request.message);

        // Guardrail verdicts are terminal and are never cached
        if let Some(verdict) = self.guardrail.check(&normalized) {
            let classification = self.guardrail_classification(verdict);
            let decision = self.synthesizer.synthesize(&classification);
            return self.finish(&digest, decision, started);
        }

        let version = self.version.current();
        let key = CacheKey::compute(version, &normalized);
        if let Some(mut decision) = self.cache.get(&key, version) {
            metrics().cache_hit();
            decision.resolved_by = ResolverStage::Cache;
            return self.finish(&digest, decision, started);
        }
        metrics().cache_miss();

        let classification = self.resolve_intent(request, &normalized, &digest).await;
        metrics().stage_resolved(classification.resolved_by);

        let decision = self.synthesizer.synthesize(&classification);
        self.cache.insert(key, decision.clone(), version);

        if let Some(shadow) = &self.shadow {
            shadow.evaluate(request, &classification);
        }

        self.finish(&digest, decision, started)
    }

    /// The classification tiers: semantic, external, lexical
    async fn resolve_intent(
        &self,
        request: &RouteRequest,
        normalized: &str,
        digest: &RequestDigest,
    ) -> Classification {
        if let SemanticOutcome::Match { intent, score } = self.matcher.resolve(normalized).await {
            return Classification {
                intent,
                complexity: estimate_complexity(normalized),
                confidence: ConfidenceScore::new(score),
                resolved_by: ResolverStage::Semantic,
            };
        }

        if let Some(classifier) = &self.classifier {
            match classifier.classify(request).await {
                Ok(classification) => {
                    self.remember_learning_candidate(digest, normalized, &classification);
                    return classification;
                }
                Err(ClassifyError::Timeout { budget_ms }) => {
                    metrics().classifier_timeout();
                    warn!(budget_ms, "External classifier timed out, falling back");
                }
                Err(error) => {
                    metrics().classifier_error();
                    warn!(error = %error, "External classifier failed, falling back");
                }
            }
        }

        self.fallback.classify_text(normalized)
    }

    fn guardrail_classification(&self, verdict: GuardrailVerdict) -> Classification {
        let intent = match verdict {
            GuardrailVerdict::PrivacyUnlock => {
                metrics().guardrail_unlock();
                IntentLabel::PrivacyUnlock
            }
            GuardrailVerdict::Blocked => {
                metrics().guardrail_block();
                IntentLabel::Blocked
            }
        };
        Classification {
            intent,
            complexity: ComplexityTier::Simple,
            confidence: ConfidenceScore::new(1.0),
            resolved_by: ResolverStage::Guardrail,
        }
    }

    fn finish(
        &self,
        digest: &RequestDigest,
        decision: RoutingDecision,
        started: Instant,
    ) -> RoutingDecision {
        let latency = started.elapsed();
        metrics().record_routing_latency(latency);
        self.recorder.record(RoutingTrace::from_decision(
            digest.clone(),
            &decision,
            latency.as_millis() as u64,
        ));
        debug!(
            intent = %decision.intent,
            complexity = %decision.complexity,
            confidence = %decision.confidence,
            resolved_by = %decision.resolved_by,
            latency_ms = latency.as_millis() as u64,
            "Request routed"
        );
        decision
    }

    fn remember_learning_candidate(
        &self,
        digest: &RequestDigest,
        normalized: &str,
        classification: &Classification,
    ) {
        let mut pending = self.pending_learning.lock().unwrap();
        pending.remember(
            digest.clone(),
            LearningCandidate {
                text: normalized.to_string(),
                intent: classification.intent.clone(),
            },
        );
    }

    /// Attach feedback to a routed request and, when it confirms or
    /// corrects a classifier-resolved label, grow the corpus with it
    pub async fn record_feedback(&self, digest: &RequestDigest, feedback: TraceFeedback) {
        self.recorder.record_feedback(digest, feedback.clone()).await;

        let candidate = {
            let mut pending = self.pending_learning.lock().unwrap();
            pending.take(digest)
        };
        let Some(candidate) = candidate else {
            debug!(
                digest = digest.as_str(),
                "Feedback for an unknown or non-learnable request"
            );
            return;
        };

        let outcome = match feedback {
            TraceFeedback::Positive => {
                self.matcher.learn(&candidate.text, candidate.intent).await
            }
            TraceFeedback::Corrected { intent } => {
                self.matcher.relabel(&candidate.text, intent).await
            }
            // A bare "wrong" with no correction teaches nothing
            TraceFeedback::Negative => return,
        };

        match outcome {
            Ok(()) => {
                metrics().corpus_item_learned();
                info!(digest = digest.as_str(), "Corpus learned from feedback");
            }
            Err(error) => {
                warn!(error = %error, "Corpus learning failed");
            }
        }
    }

    /// Seed an empty corpus with the built-in bilingual example set
    pub async fn seed_corpus(&self) -> RouterResult<usize> {
        self.matcher
            .seed_defaults()
            .await
            .map_err(|error| RouterError::state(format!("corpus seeding failed: {error}")))
    }

    /// Increment the persisted system version, stranding all cached
    /// decisions keyed under the old one
    pub fn bump_version(&self) -> RouterResult<u64> {
        self.version
            .bump()
            .map_err(|error| RouterError::state(format!("version marker write failed: {error}")))
    }

    pub fn current_version(&self) -> u64 {
        self.version.current()
    }

    pub fn cached_decisions(&self) -> usize {
        self.cache.len()
    }
}
