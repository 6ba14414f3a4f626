//! Embedding integration for the semantic matcher
//!
//! The matcher only needs one operation: turn text into a vector. The
//! `Embedder` trait keeps the model server behind a seam so tests can swap
//! in a deterministic implementation; `OllamaEmbedder` is the production
//! adapter against a local Ollama-compatible server.

use crate::config::{ConfigError, EmbeddingSection};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Embedding errors; always degradable, never fatal to a request
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Embedding request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid embedding response: {message}")]
    InvalidResponse { message: String },
}

impl EmbedError {
    pub fn request_failed<S: Into<String>>(message: S) -> Self {
        Self::RequestFailed {
            message: message.into(),
        }
    }

    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

/// Text-to-vector seam used by the semantic matcher and the learning path
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Cosine similarity clamped to [0, 1]
///
/// Mismatched dimensions mean the vectors came from different models and
/// cannot be compared; that scores 0 rather than erroring.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Embedding adapter for a local Ollama-compatible server
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingSection) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                ConfigError::InvalidConfig(format!("failed to build embedding client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama-embeddings"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let request = EmbeddingsRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::request_failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbedError::request_failed(format!(
                "embedding server returned {}",
                response.status()
            )));
        }

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::invalid_response(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(EmbedError::invalid_response("empty embedding vector"));
        }
        Ok(body.embedding)
    }
}
