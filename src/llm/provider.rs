//! LLM provider seam
//!
//! The classifier treats the language model as a black box behind this
//! trait: hand it messages, get text back. Providers know nothing about
//! intents or routing; constrained output is requested through
//! `ResponseFormat` and interpreted by the caller.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// A single chat message
///
/// The router only ever speaks as `system` (the classification contract)
/// and `user` (the message under classification).
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// `None` leaves the model unconstrained
    pub response_format: Option<ResponseFormat>,
}

/// How the model's output is constrained
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    /// Any syntactically valid JSON object
    Json,
    /// JSON conforming to the supplied schema
    JsonSchema { schema: NamedJsonSchema },
}

/// A labeled JSON Schema passed through to the model server
#[derive(Debug, Clone)]
pub struct NamedJsonSchema {
    pub name: String,
    pub value: serde_json::Value,
}

/// What came back from one completion call
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// `None` when the server produced an empty reply
    pub content: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why generation stopped
#[derive(Debug, Clone, PartialEq)]
pub enum FinishReason {
    /// Natural end of output
    Stop,
    /// Token budget exhausted, so the content is likely truncated JSON
    Length,
}

/// Seam between the classifier and a model server; mocked in tests
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Cheap reachability probe, used once at startup
    async fn health_check(&self) -> Result<(), LlmError>;
}

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
}
