//! Learning loop and trace recording tests
//!
//! Covers the feedback path end to end: classifier resolutions become
//! learning candidates, positive or corrected feedback grows the persisted
//! corpus, and the grown corpus resolves the same message semantically once
//! the version bump clears the cache. Also checks that every route and
//! every piece of feedback lands in the trace sink.


use std::time::Duration;
use switchboard::decision::{IntentLabel, ResolverStage};
use switchboard::request::{RequestDigest, RouteRequest};
use switchboard::testing::mocks::{MemoryTraceSink, MockLlmProvider};
use switchboard::trace::{RoutingTrace, TraceFeedback};
use tempfile::TempDir;
use test_helpers::{build_router, classifier_reply, test_config};

/// Route writes are fire-and-forget; poll until they land
async fn wait_for_routes(sink: &MemoryTraceSink, at_least: usize) -> Vec<RoutingTrace> {
    for _ in 0..500 {
        let routes = sink.get_routes().await;
        if routes.len() >= at_least {
            return routes;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    sink.get_routes().await
}

#[tokio::test]
async fn test_positive_feedback_teaches_the_matcher() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let provider = MockLlmProvider::single_response(classifier_reply("coding", "medium", 0.88));
    let requests = std::sync::Arc::clone(&provider.received_requests);
    let (router, _sink) = build_router(&config, provider);

    let request = RouteRequest::new("напиши тесты для парсера конфигурации");
    let first = router.classify(&request).await;
    assert_eq!(first.resolved_by, ResolverStage::Classifier);

    router
        .record_feedback(&request.digest(), TraceFeedback::Positive)
        .await;

    // The confirmed example is persisted under the state directory
    let corpus = std::fs::read_to_string(config.corpus_path()).unwrap();
    assert_eq!(corpus.lines().count(), 1);
    assert!(corpus.contains("coding"));

    // Clear the cache path, then the corpus answers before the classifier
    router.bump_version().unwrap();
    let second = router.classify(&request).await;
    assert_eq!(second.resolved_by, ResolverStage::Semantic);
    assert_eq!(second.intent, IntentLabel::Coding);
    assert!((second.confidence.value() - 1.0).abs() < 1e-5);
    assert_eq!(
        requests.lock().await.len(),
        1,
        "the learned example should spare the second classifier call"
    );
}

#[tokio::test]
async fn test_corrected_feedback_relabels() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let provider = MockLlmProvider::single_response(classifier_reply("search", "simple", 0.85));
    let (router, _sink) = build_router(&config, provider);

    let request = RouteRequest::new("установи новую версию докера");
    let first = router.classify(&request).await;
    assert_eq!(first.intent, IntentLabel::Search);

    router
        .record_feedback(
            &request.digest(),
            TraceFeedback::Corrected {
                intent: IntentLabel::SystemCommand,
            },
        )
        .await;

    router.bump_version().unwrap();
    let second = router.classify(&request).await;
    assert_eq!(second.resolved_by, ResolverStage::Semantic);
    assert_eq!(second.intent, IntentLabel::SystemCommand);
}

#[tokio::test]
async fn test_negative_feedback_teaches_nothing() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let provider = MockLlmProvider::single_response(classifier_reply("coding", "medium", 0.9));
    let requests = std::sync::Arc::clone(&provider.received_requests);
    let (router, _sink) = build_router(&config, provider);

    let request = RouteRequest::new("сделай рефакторинг модуля платежей");
    router.classify(&request).await;
    router
        .record_feedback(&request.digest(), TraceFeedback::Negative)
        .await;

    let corpus = std::fs::read_to_string(config.corpus_path()).unwrap();
    assert!(
        corpus.is_empty(),
        "a bare negative must not append to the corpus"
    );

    // Without a learned example the classifier is consulted again
    router.bump_version().unwrap();
    let second = router.classify(&request).await;
    assert_eq!(second.resolved_by, ResolverStage::Classifier);
    assert_eq!(requests.lock().await.len(), 2);
}

#[tokio::test]
async fn test_feedback_for_unknown_digest_is_recorded_but_ignored() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let (router, sink) = build_router(&config, MockLlmProvider::with_failure());

    let digest = RequestDigest::of_message("это сообщение никогда не маршрутизировалось");
    router.record_feedback(&digest, TraceFeedback::Positive).await;

    let corpus = std::fs::read_to_string(config.corpus_path()).unwrap();
    assert!(corpus.is_empty());
    let feedback = sink.get_feedback().await;
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].0, digest);
}

#[tokio::test]
async fn test_fallback_resolutions_are_not_learning_candidates() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let (router, _sink) = build_router(&config, MockLlmProvider::with_failure());

    let request = RouteRequest::new("удали кэш сборки");
    let decision = router.classify(&request).await;
    assert_eq!(decision.resolved_by, ResolverStage::Fallback);

    router
        .record_feedback(&request.digest(), TraceFeedback::Positive)
        .await;

    let corpus = std::fs::read_to_string(config.corpus_path()).unwrap();
    assert!(
        corpus.is_empty(),
        "low-confidence fallback labels must never seed the corpus"
    );
}

#[tokio::test]
async fn test_every_route_and_feedback_reaches_the_trace_log() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let provider = MockLlmProvider::single_response(classifier_reply("greeting", "simple", 0.8));
    let (router, sink) = build_router(&config, provider);

    let request = RouteRequest::new("добрый вечер, как дела?");
    let decision = router.classify(&request).await;
    router
        .record_feedback(&request.digest(), TraceFeedback::Positive)
        .await;

    let routes = wait_for_routes(&sink, 1).await;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].request_digest, request.digest());
    assert_eq!(routes[0].intent, decision.intent);
    assert_eq!(routes[0].resolved_by, ResolverStage::Classifier);

    let feedback = sink.get_feedback().await;
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].1, TraceFeedback::Positive);
}

#[tokio::test]
async fn test_trace_sink_failure_never_breaks_routing() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    let sink = std::sync::Arc::new(MemoryTraceSink::with_failure());
    let router = switchboard::router::RequestRouter::new(
        &config,
        std::sync::Arc::new(MockLlmProvider::single_response(classifier_reply(
            "conversation",
            "simple",
            0.8,
        ))),
        std::sync::Arc::new(switchboard::testing::mocks::HashEmbedder::new()),
        std::sync::Arc::clone(&sink) as std::sync::Arc<dyn switchboard::trace::TraceSink>,
    )
    .unwrap();

    let request = RouteRequest::new("расскажи что-нибудь интересное");
    let decision = router.classify(&request).await;
    assert_eq!(decision.intent, IntentLabel::Conversation);

    // Feedback still reaches the learning path even when the sink is down
    router
        .record_feedback(&request.digest(), TraceFeedback::Positive)
        .await;
    let corpus = std::fs::read_to_string(config.corpus_path()).unwrap();
    assert_eq!(corpus.lines().count(), 1);
}
