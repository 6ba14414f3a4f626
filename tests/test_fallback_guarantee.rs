//! Fallback guarantee tests
//!
//! Whatever the external classifier does (hang, fail, return garbage, or
//! be disabled), `classify` still returns a decision, and decisions built
//! by the lexical fallback stay low-confidence and short-lived.


use std::sync::Arc;
use switchboard::classifier::FALLBACK_CONFIDENCE_CEILING;
use switchboard::decision::{IntentLabel, ResolverStage, StreamingMode};
use switchboard::policy::FALLBACK_TTL_CEILING_SECS;
use switchboard::request::RouteRequest;
use switchboard::testing::mocks::MockLlmProvider;
use tempfile::TempDir;
use test_helpers::{build_router, classifier_reply, test_config};

#[tokio::test(start_paused = true)]
async fn test_hanging_classifier_times_out_into_fallback() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let (router, _sink) = build_router(&config, MockLlmProvider::hanging());

    let decision = router
        .classify(&RouteRequest::new("удали старые логи из папки проектов"))
        .await;

    assert_eq!(decision.intent, IntentLabel::DeleteRequest);
    assert_eq!(decision.resolved_by, ResolverStage::Fallback);
    assert!(decision.confidence.value() <= FALLBACK_CONFIDENCE_CEILING);
    assert!(
        decision.requires_confirmation,
        "a fallback-resolved destructive intent must be confirmed"
    );
    assert!(decision.cache_ttl_secs <= FALLBACK_TTL_CEILING_SECS);
}

#[tokio::test]
async fn test_failing_classifier_degrades_to_conversation() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let (router, _sink) = build_router(&config, MockLlmProvider::with_failure());

    let decision = router
        .classify(&RouteRequest::new("что думаешь о погоде сегодня?"))
        .await;

    assert_eq!(decision.intent, IntentLabel::Conversation);
    assert_eq!(decision.resolved_by, ResolverStage::Fallback);
    assert!((decision.confidence.value() - 0.40).abs() < 1e-6);
    assert_eq!(decision.streaming, StreamingMode::Immediate);
}

#[tokio::test]
async fn test_prose_reply_is_rejected_and_falls_back() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let provider = MockLlmProvider::single_response("I think this message is about coding.");
    let (router, _sink) = build_router(&config, provider);

    let decision = router
        .classify(&RouteRequest::new("помоги разобраться с ошибкой в коде"))
        .await;

    assert_eq!(decision.intent, IntentLabel::Coding);
    assert_eq!(decision.resolved_by, ResolverStage::Fallback);
    assert!(decision.confidence.value() <= FALLBACK_CONFIDENCE_CEILING);
}

#[tokio::test]
async fn test_unknown_label_is_rejected_by_the_schema() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let provider = MockLlmProvider::single_response(classifier_reply("pizza_order", "simple", 0.9));
    let (router, _sink) = build_router(&config, provider);

    let decision = router
        .classify(&RouteRequest::new("закажи пиццу на вечер"))
        .await;

    assert_eq!(decision.resolved_by, ResolverStage::Fallback);
}

#[tokio::test]
async fn test_accepted_classification_is_floored_above_fallback() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let provider = MockLlmProvider::single_response(classifier_reply("search", "simple", 0.30));
    let (router, _sink) = build_router(&config, provider);

    let decision = router
        .classify(&RouteRequest::new("где ближайшая аптека"))
        .await;

    assert_eq!(decision.intent, IntentLabel::Search);
    assert_eq!(decision.resolved_by, ResolverStage::Classifier);
    assert!(
        decision.confidence.value() > FALLBACK_CONFIDENCE_CEILING,
        "an accepted classification must rank above any fallback decision"
    );
}

#[tokio::test]
async fn test_disabled_classifier_never_calls_the_provider() {
    let state = TempDir::new().unwrap();
    let mut config = test_config(&state);
    config.classifier.enabled = false;

    let provider = MockLlmProvider::single_response(classifier_reply("coding", "medium", 0.9));
    let requests = Arc::clone(&provider.received_requests);
    let (router, _sink) = build_router(&config, provider);

    let decision = router
        .classify(&RouteRequest::new("удали временные файлы"))
        .await;

    assert_eq!(decision.intent, IntentLabel::DeleteRequest);
    assert_eq!(decision.resolved_by, ResolverStage::Fallback);
    assert!(requests.lock().await.is_empty());
}
