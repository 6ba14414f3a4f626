//! Mock implementations for testing
//!
//! Provides mock LlmProvider, Embedder, TraceSink, and IntentClassifier
//! implementations so the pipeline can be exercised without a running
//! model server or a writable state directory.

use crate::classifier::{ClassifyError, IntentClassifier};
use crate::decision::{Classification, ComplexityTier, ConfidenceScore, IntentLabel, ResolverStage};
use crate::embedding::{EmbedError, Embedder};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::request::{RequestDigest, RouteRequest};
use crate::trace::{RoutingTrace, TraceError, TraceFeedback, TraceSink};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock LLM provider for testing
#[derive(Debug)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub received_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
    pub should_hang: bool,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            current_response: Arc::new(Mutex::new(0)),
            received_requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            should_hang: false,
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    /// A provider whose requests never complete; for timeout tests
    pub fn hanging() -> Self {
        Self {
            should_hang: true,
            ..Self::new(vec![])
        }
    }

    pub async fn get_received_requests(&self) -> Vec<CompletionRequest> {
        self.received_requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.received_requests.lock().await.push(request);

        if self.should_hang {
            std::future::pending::<()>().await;
        }

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let mut current = self.current_response.lock().await;
        let response_idx = *current % self.responses.len().max(1);
        *current += 1;

        let content = if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            self.responses[response_idx].clone()
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Deterministic embedder: identical text maps to an identical vector
///
/// Vectors are pseudo-random per input, so equal texts score 1.0 and
/// unrelated texts score near zero. Good enough to drive the matcher in
/// tests without a model server.
#[derive(Debug, Default)]
pub struct HashEmbedder {
    pub should_fail: bool,
    pub calls: AtomicU64,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            calls: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        // xorshift from the text hash; 64 dims keeps accidental cosine
        // similarity between distinct texts far below any threshold
        let mut state = hasher.finish() | 1;
        (0..64)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(EmbedError::request_failed("Mock embedding failure"));
        }
        Ok(Self::vector_for(text))
    }
}

/// Trace sink that records to memory
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    pub routes: Arc<Mutex<Vec<RoutingTrace>>>,
    pub feedback: Arc<Mutex<Vec<(RequestDigest, TraceFeedback)>>>,
    pub should_fail: bool,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn get_routes(&self) -> Vec<RoutingTrace> {
        self.routes.lock().await.clone()
    }

    pub async fn get_feedback(&self) -> Vec<(RequestDigest, TraceFeedback)> {
        self.feedback.lock().await.clone()
    }
}

#[async_trait]
impl TraceSink for MemoryTraceSink {
    async fn append(&self, trace: RoutingTrace) -> Result<(), TraceError> {
        if self.should_fail {
            return Err(TraceError::Io(std::io::Error::other("Mock trace failure")));
        }
        self.routes.lock().await.push(trace);
        Ok(())
    }

    async fn record_feedback(
        &self,
        digest: &RequestDigest,
        feedback: TraceFeedback,
    ) -> Result<(), TraceError> {
        if self.should_fail {
            return Err(TraceError::Io(std::io::Error::other("Mock trace failure")));
        }
        self.feedback.lock().await.push((digest.clone(), feedback));
        Ok(())
    }
}

/// Classifier with a scripted outcome
#[derive(Debug)]
pub struct ScriptedClassifier {
    classification: Option<Classification>,
    should_fail: bool,
    should_panic: bool,
    should_hang: bool,
    pub calls: AtomicU64,
}

impl ScriptedClassifier {
    pub fn returning(classification: Classification) -> Self {
        Self {
            classification: Some(classification),
            should_fail: false,
            should_panic: false,
            should_hang: false,
            calls: AtomicU64::new(0),
        }
    }

    /// Shorthand for a classifier-stage result with the given label
    pub fn labeling(intent: IntentLabel, confidence: f32) -> Self {
        Self::returning(Classification {
            intent,
            complexity: ComplexityTier::Simple,
            confidence: ConfidenceScore::new(confidence),
            resolved_by: ResolverStage::Classifier,
        })
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::labeling(IntentLabel::Conversation, 0.5)
        }
    }

    pub fn panicking() -> Self {
        Self {
            should_panic: true,
            ..Self::labeling(IntentLabel::Conversation, 0.5)
        }
    }

    pub fn hanging() -> Self {
        Self {
            should_hang: true,
            ..Self::labeling(IntentLabel::Conversation, 0.5)
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, _request: &RouteRequest) -> Result<Classification, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.should_panic {
            panic!("scripted classifier panic");
        }
        if self.should_hang {
            std::future::pending::<()>().await;
        }
        if self.should_fail {
            return Err(ClassifyError::provider("scripted failure"));
        }

        match &self.classification {
            Some(classification) => Ok(classification.clone()),
            None => Err(ClassifyError::provider("scripted classifier is empty")),
        }
    }
}
