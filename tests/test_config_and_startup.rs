//! Configuration loading and startup failure tests
//!
//! The router must refuse to start on anything it cannot trust: malformed
//! guardrail patterns, a missing or corrupt corpus, or an unreadable
//! version marker. Silent degradation at startup would disable the safety
//! tier without anyone noticing.


use std::sync::Arc;
use switchboard::config::RouterConfig;
use switchboard::error::RouterError;
use switchboard::router::RequestRouter;
use switchboard::testing::mocks::{HashEmbedder, MemoryTraceSink, MockLlmProvider};
use switchboard::trace::TraceSink;
use tempfile::TempDir;
use test_helpers::test_config;

fn try_build(config: &RouterConfig) -> Result<RequestRouter, RouterError> {
    RequestRouter::new(
        config,
        Arc::new(MockLlmProvider::with_failure()),
        Arc::new(HashEmbedder::new()),
        Arc::new(MemoryTraceSink::new()) as Arc<dyn TraceSink>,
    )
}

#[tokio::test]
async fn test_default_config_builds_a_router() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    assert!(try_build(&config).is_ok());

    // First boot initializes the version marker on disk
    let marker = std::fs::read_to_string(config.version_path()).unwrap();
    assert_eq!(marker.trim(), "1");
}

#[tokio::test]
async fn test_malformed_guardrail_pattern_is_startup_fatal() {
    let state = TempDir::new().unwrap();
    let mut config = test_config(&state);
    config.guardrail.unlock_patterns.push("(unclosed".to_string());

    let err = try_build(&config).unwrap_err();
    assert!(matches!(err, RouterError::Config(_)));
    assert!(
        err.to_string().contains("pattern"),
        "error should name the bad pattern: {err}"
    );
}

#[tokio::test]
async fn test_corrupt_corpus_is_startup_fatal() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    std::fs::write(config.corpus_path(), "{this is not json}\n").unwrap();

    let err = try_build(&config).unwrap_err();
    assert!(err.to_string().contains("corpus"));
}

#[tokio::test]
async fn test_missing_corpus_file_is_startup_fatal() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    std::fs::remove_file(config.corpus_path()).unwrap();

    let err = try_build(&config).unwrap_err();
    assert!(err.to_string().contains("initialize the state directory"));
}

#[tokio::test]
async fn test_garbage_version_marker_is_startup_fatal() {
    let state = TempDir::new().unwrap();
    let config = test_config(&state);
    std::fs::write(config.version_path(), "not-a-number\n").unwrap();

    let err = try_build(&config).unwrap_err();
    assert!(err.to_string().contains("version marker"));
}

#[tokio::test]
async fn test_invalid_cache_capacity_is_rejected() {
    let state = TempDir::new().unwrap();
    let mut config = test_config(&state);
    config.cache.capacity = 0;

    assert!(try_build(&config).is_err());
}

#[test]
fn test_config_loads_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("switchboard.toml");
    std::fs::write(
        &path,
        r#"
            [router]
            state_dir = "/tmp/switchboard-test"

            [cache]
            capacity = 32

            [classifier]
            model = "llama3.1:8b"
            timeout_ms = 1200

            [shadow]
            enabled = true
        "#,
    )
    .unwrap();

    let config = RouterConfig::load_from_file(&path).unwrap();
    assert_eq!(config.cache.capacity, 32);
    assert_eq!(config.classifier.model, "llama3.1:8b");
    assert_eq!(config.classifier.timeout_ms, 1200);
    assert!(config.shadow.enabled);
}

#[test]
fn test_invalid_toml_values_fail_at_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("switchboard.toml");
    std::fs::write(
        &path,
        r#"
            [semantic]
            default_threshold = 2.5
        "#,
    )
    .unwrap();

    assert!(RouterConfig::load_from_file(&path).is_err());
}
