//! External LLM classifier
//!
//! Wraps an [`LlmProvider`] into the [`IntentClassifier`] contract: one
//! schema-constrained completion per request under a hard time budget.
//! Exactly one attempt. On timeout or any provider or parse failure the
//! error is returned and the caller moves on to the lexical fallback; a
//! retry here would double the worst-case latency of every degraded
//! request for no benefit a fallback cannot provide.

use super::schema::{validate_against_schema, ClassifierOutput};
use super::{ClassifyError, IntentClassifier, CLASSIFIER_CONFIDENCE_FLOOR};
use crate::config::ClassifierSection;
use crate::decision::{Classification, ConfidenceScore, IntentLabel, ResolverStage};
use crate::error::sanitize_error_message;
use crate::llm::provider::{
    CompletionRequest, LlmProvider, Message, NamedJsonSchema, ResponseFormat,
};
use crate::request::RouteRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SCHEMA_NAME: &str = "intent_classification";

/// Schema-constrained intent classification through an LLM provider
pub struct LlmClassifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    schema: Value,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ClassifierSection) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_millis(config.timeout_ms),
            schema: ClassifierOutput::json_schema_with_intents(&IntentLabel::CLASSIFIABLE),
        }
    }

    /// Same provider and budget, different model. Used for shadow runs.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(&self, request: &RouteRequest) -> Vec<Message> {
        let labels: Vec<&str> = IntentLabel::CLASSIFIABLE
            .iter()
            .map(|label| label.as_str())
            .collect();

        let system = format!(
            "You are the request classifier of a local assistant. \
             Classify the user message into exactly one intent.\n\
             Allowed intents: {}.\n\
             Complexity tiers: simple (one short step), medium (a normal \
             request), complex (multi-step or long-form work).\n\
             Respond with a single JSON object matching the required schema. \
             No prose, no markdown.",
            labels.join(", ")
        );

        let user = match &request.context_snippet {
            Some(context) => format!(
                "Recent conversation:\n{}\n\nMessage: {}",
                context, request.message
            ),
            None => format!("Message: {}", request.message),
        };

        vec![Message::system(system), Message::user(user)]
    }

    fn parse_output(&self, content: &str) -> Result<Classification, ClassifyError> {
        let value: Value = serde_json::from_str(content.trim())
            .map_err(|error| ClassifyError::malformed_output(format!("not valid JSON: {error}")))?;

        validate_against_schema(&value, &self.schema).map_err(ClassifyError::malformed_output)?;

        let output: ClassifierOutput = serde_json::from_value(value)
            .map_err(|error| ClassifyError::malformed_output(error.to_string()))?;
        output.validate().map_err(ClassifyError::malformed_output)?;

        debug!(
            intent = %output.intent,
            confidence = output.confidence,
            reasoning = %output.reasoning,
            "Classifier output accepted"
        );

        Ok(Classification {
            intent: IntentLabel::from(output.intent),
            complexity: output.complexity,
            // Floor keeps an accepted classification above the fallback tier
            confidence: ConfidenceScore::new(output.confidence.max(CLASSIFIER_CONFIDENCE_FLOOR)),
            resolved_by: ResolverStage::Classifier,
        })
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify(&self, request: &RouteRequest) -> Result<Classification, ClassifyError> {
        let completion = CompletionRequest {
            messages: self.build_messages(request),
            model: self.model.clone(),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            response_format: Some(ResponseFormat::JsonSchema {
                schema: NamedJsonSchema {
                    name: SCHEMA_NAME.to_string(),
                    value: self.schema.clone(),
                },
            }),
        };

        let budget_ms = self.timeout.as_millis() as u64;
        let response = tokio::time::timeout(self.timeout, self.provider.complete(completion))
            .await
            .map_err(|_| ClassifyError::Timeout { budget_ms })?
            .map_err(|error| {
                ClassifyError::provider(sanitize_error_message(&error.to_string()))
            })?;

        let content = response
            .content
            .ok_or_else(|| ClassifyError::malformed_output("completion carried no content"))?;

        self.parse_output(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ComplexityTier;
    use crate::testing::mocks::MockLlmProvider;

    fn section(timeout_ms: u64) -> ClassifierSection {
        ClassifierSection {
            timeout_ms,
            ..ClassifierSection::default()
        }
    }

    fn classifier_with(provider: MockLlmProvider) -> LlmClassifier {
        LlmClassifier::new(Arc::new(provider), &section(2500))
    }

    fn valid_output() -> String {
        serde_json::json!({
            "intent": "coding",
            "complexity": "medium",
            "confidence": 0.95,
            "reasoning": "asks for a sorting function"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_valid_output_becomes_classification() {
        let classifier = classifier_with(MockLlmProvider::single_response(valid_output()));
        let request = RouteRequest::new("напиши функцию сортировки");

        let result = classifier.classify(&request).await.unwrap();
        assert_eq!(result.intent, IntentLabel::Coding);
        assert_eq!(result.complexity, ComplexityTier::Medium);
        assert!((result.confidence.value() - 0.95).abs() < 1e-6);
        assert_eq!(result.resolved_by, ResolverStage::Classifier);
    }

    #[tokio::test]
    async fn test_low_confidence_is_floored() {
        let output = serde_json::json!({
            "intent": "conversation",
            "complexity": "simple",
            "confidence": 0.2,
            "reasoning": "unsure"
        })
        .to_string();
        let classifier = classifier_with(MockLlmProvider::single_response(output));

        let result = classifier
            .classify(&RouteRequest::new("ну что"))
            .await
            .unwrap();
        assert!((result.confidence.value() - CLASSIFIER_CONFIDENCE_FLOOR).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unknown_intent_is_rejected() {
        let output = serde_json::json!({
            "intent": "pizza_order",
            "complexity": "simple",
            "confidence": 0.9,
            "reasoning": "hungry"
        })
        .to_string();
        let classifier = classifier_with(MockLlmProvider::single_response(output));

        let error = classifier
            .classify(&RouteRequest::new("закажи пиццу"))
            .await
            .unwrap_err();
        assert!(matches!(error, ClassifyError::MalformedOutput { .. }));
    }

    #[tokio::test]
    async fn test_non_json_output_is_rejected() {
        let classifier =
            classifier_with(MockLlmProvider::single_response("Sure! The intent is coding."));

        let error = classifier
            .classify(&RouteRequest::new("напиши код"))
            .await
            .unwrap_err();
        assert!(matches!(error, ClassifyError::MalformedOutput { .. }));
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let classifier = classifier_with(MockLlmProvider::with_failure());

        let error = classifier
            .classify(&RouteRequest::new("что угодно"))
            .await
            .unwrap_err();
        assert!(matches!(error, ClassifyError::Provider { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_hits_the_time_budget() {
        let classifier = LlmClassifier::new(Arc::new(MockLlmProvider::hanging()), &section(2500));

        let error = classifier
            .classify(&RouteRequest::new("удали все файлы в папке"))
            .await
            .unwrap_err();
        assert!(matches!(error, ClassifyError::Timeout { budget_ms: 2500 }));
    }

    #[tokio::test]
    async fn test_request_carries_schema_and_settings() {
        let provider = MockLlmProvider::single_response(valid_output());
        let received = Arc::clone(&provider.received_requests);
        let classifier = LlmClassifier::new(Arc::new(provider), &section(2500));

        classifier
            .classify(&RouteRequest::new("напиши тест"))
            .await
            .unwrap();

        let requests = received.lock().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(256));
        match &request.response_format {
            Some(ResponseFormat::JsonSchema { schema }) => {
                assert_eq!(schema.name, SCHEMA_NAME);
                let enum_values = schema.value["properties"]["intent"]["enum"]
                    .as_array()
                    .expect("intent enum present");
                assert!(enum_values.iter().any(|v| v == "delete_request"));
            }
            other => panic!("expected schema-constrained format, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_context_snippet_lands_in_the_prompt() {
        let provider = MockLlmProvider::single_response(valid_output());
        let received = Arc::clone(&provider.received_requests);
        let classifier = LlmClassifier::new(Arc::new(provider), &section(2500));

        let request =
            RouteRequest::new("а теперь вторую").with_context("обсуждали функцию сортировки");
        classifier.classify(&request).await.unwrap();

        let requests = received.lock().await;
        assert!(requests[0].messages[1]
            .content
            .contains("обсуждали функцию сортировки"));
    }

    #[tokio::test]
    async fn test_shadow_model_override() {
        let classifier = classifier_with(MockLlmProvider::single_response(valid_output()))
            .with_model("qwen2.5:3b-instruct");
        assert_eq!(classifier.model(), "qwen2.5:3b-instruct");
    }
}
