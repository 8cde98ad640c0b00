//! OpenAI-compatible chat-completions backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use draftsmith_shared::{
    DraftsmithError, GenerationConfig, GenerationRequest, ResponseFormat, Result,
    api_key_from_env,
};

use crate::Generator;

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("Draftsmith/", env!("CARGO_PKG_VERSION"));

/// [`Generator`] speaking the `/chat/completions` wire format.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleGenerator {
    /// Create a backend for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DraftsmithError::generation(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Create a backend from `[generation]`, reading the key from its env var.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Self::new(&config.base_url, api_key, &config.model, config.timeout())
    }
}

#[async_trait]
impl Generator for OpenAiCompatibleGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            temperature: request.options.temperature,
            response_format: match request.options.response_format {
                ResponseFormat::Json => Some(ChatResponseFormat {
                    kind: "json_object",
                }),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DraftsmithError::generation(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(200).collect();
            return Err(DraftsmithError::generation(format!(
                "{}: HTTP {status}: {detail}",
                self.endpoint
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            DraftsmithError::generation(format!("failed to parse completion response: {e}"))
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion received"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DraftsmithError::generation("completion response missing choices[0] content"))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ChatResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: draftsmith_shared::Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_shared::{GenerationOptions, Message};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        })
    }

    fn request(format: ResponseFormat) -> GenerationRequest {
        GenerationRequest {
            messages: vec![Message::system("be brief"), Message::user("hello")],
            options: GenerationOptions {
                temperature: 0.0,
                response_format: format,
            },
        }
    }

    fn backend(server: &MockServer) -> OpenAiCompatibleGenerator {
        OpenAiCompatibleGenerator::new(&server.uri(), "sk-test", "test-model", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn sends_chat_request_and_returns_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "temperature": 0.0,
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let text = backend(&server)
            .generate(&request(ResponseFormat::Text))
            .await
            .unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn json_mode_sets_response_format() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"urls":[]}"#)))
            .expect(1)
            .mount(&server)
            .await;

        let text = backend(&server)
            .generate(&request(ResponseFormat::Json))
            .await
            .unwrap();
        assert_eq!(text, r#"{"urls":[]}"#);
    }

    #[tokio::test]
    async fn http_error_is_generation_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate(&request(ResponseFormat::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, DraftsmithError::GenerationFailure(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn missing_choices_is_generation_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate(&request(ResponseFormat::Text))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("choices[0]"));
    }

    #[test]
    fn trailing_slash_in_base_url() {
        let backend =
            OpenAiCompatibleGenerator::new("http://localhost:1/v1/", "k", "m", Duration::from_secs(1))
                .unwrap();
        assert_eq!(backend.endpoint, "http://localhost:1/v1/chat/completions");
    }
}
