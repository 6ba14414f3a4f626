//! Ollama provider implementation
//!
//! Adapter for a local Ollama-compatible model server. The assistant runs
//! fully local, so this is the only production provider; everything else
//! goes through mocks. Structured output uses Ollama's native `format`
//! field, which takes either `"json"` or a full JSON schema.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    ResponseFormat, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Transport-level safety net; the classifier applies the real budget
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Ollama provider implementation
#[derive(Debug)]
pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        if config.base_url.is_empty() {
            return Err(LlmError::NotConfigured(
                "Ollama base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            config: OllamaConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
        })
    }

    /// Convert a completion request to the Ollama chat format (pure function)
    fn convert_request(request: &CompletionRequest) -> OllamaChatRequest<'_> {
        let format = request.response_format.as_ref().map(|rf| match rf {
            ResponseFormat::Json => serde_json::Value::String("json".to_string()),
            ResponseFormat::JsonSchema { schema } => schema.value.clone(),
        });

        let options = OllamaOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        };

        OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            format,
            options,
        }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaChatMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/api/chat", self.config.base_url);
        let ollama_request = Self::convert_request(&request);

        debug!(model = %request.model, "sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let prompt_tokens = chat.prompt_eval_count.unwrap_or(0);
        let completion_tokens = chat.eval_count.unwrap_or(0);
        let finish_reason = match chat.done_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("stop") | None => FinishReason::Stop,
            Some(_) => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content: Some(chat.message.content),
            model: chat.model,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            finish_reason,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::ApiError(format!(
                "Ollama health check returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::NamedJsonSchema;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(uri: String) -> OllamaProvider {
        OllamaProvider::new(OllamaConfig {
            base_url: uri,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn request(format: Option<ResponseFormat>) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("классифицируй: привет")],
            model: "test-model".to_string(),
            max_tokens: Some(128),
            temperature: Some(0.1),
            response_format: format,
        }
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = OllamaProvider::new(OllamaConfig {
            base_url: String::new(),
            timeout: Duration::from_secs(1),
        })
        .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test-model",
                "message": { "role": "assistant", "content": "{\"intent\":\"greeting\"}" },
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 20,
                "eval_count": 8
            })))
            .mount(&server)
            .await;

        let response = provider(server.uri()).complete(request(None)).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("{\"intent\":\"greeting\"}"));
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.total_tokens, 28);
    }

    #[tokio::test]
    async fn test_schema_goes_into_format_field() {
        let server = MockServer::start().await;
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "intent": { "type": "string" } }
        });
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({ "format": schema })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test-model",
                "message": { "role": "assistant", "content": "{}" },
                "done": true
            })))
            .mount(&server)
            .await;

        let format = ResponseFormat::JsonSchema {
            schema: NamedJsonSchema {
                name: "classification".to_string(),
                value: schema,
            },
        };
        let response = provider(server.uri()).complete(request(Some(format))).await;
        assert!(response.is_ok(), "schema body did not match: {response:?}");
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = provider(server.uri()).complete(request(None)).await.unwrap_err();
        match err {
            LlmError::ApiError(message) => {
                assert!(message.contains("404"));
                assert!(message.contains("model not found"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
            .mount(&server)
            .await;

        let err = provider(server.uri()).complete(request(None)).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;

        provider(server.uri()).health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_check_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(server.uri()).health_check().await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError(_)));
    }
}
