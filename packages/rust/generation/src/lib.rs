//! Generation client: the text-generation capability and its call policy.
//!
//! The pipeline never talks to a model service directly. It holds a
//! [`GenerationClient`], which wraps any [`Generator`] with a fixed sampling
//! configuration, a per-call timeout, and bounded retries. Structured replies
//! are decoded against a serde schema on receipt so shape errors surface as
//! [`DraftsmithError::MalformedResponse`] instead of travelling further.

mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use draftsmith_shared::{
    DraftsmithError, GenerationConfig, GenerationOptions, GenerationRequest, Message,
    ResponseFormat, Result,
};

pub use openai::OpenAiCompatibleGenerator;

/// Initial delay between retries; doubles on every attempt.
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// The "generate text from a prompt" capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for the given prompt.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// GenerationClient
// ---------------------------------------------------------------------------

/// A [`Generator`] bound to one sampling configuration and call policy.
#[derive(Clone)]
pub struct GenerationClient {
    generator: Arc<dyn Generator>,
    temperature: f32,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl GenerationClient {
    /// Wrap a generator using the settings from `[generation]`.
    pub fn new(generator: Arc<dyn Generator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            temperature: config.temperature,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Build a client backed by the OpenAI-compatible HTTP backend.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let backend = OpenAiCompatibleGenerator::from_config(config)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Override the initial retry delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Generate plain text. Empty completions count as failures.
    pub async fn generate_text(&self, messages: Vec<Message>) -> Result<String> {
        self.call(messages, ResponseFormat::Text).await
    }

    /// Generate in JSON mode and decode the reply into `T`.
    pub async fn generate_json<T: DeserializeOwned>(&self, messages: Vec<Message>) -> Result<T> {
        let raw = self.call(messages, ResponseFormat::Json).await?;
        decode_json(&raw)
    }

    async fn call(&self, messages: Vec<Message>, response_format: ResponseFormat) -> Result<String> {
        let request = GenerationRequest {
            messages,
            options: GenerationOptions {
                temperature: self.temperature,
                response_format,
            },
        };

        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        debug!(prompt_chars, ?response_format, "invoking generation service");

        let mut attempt = 0;
        loop {
            match self.call_once(&request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt);
                    attempt += 1;
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "generation failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delay before retry number `attempt + 1`. Saturates instead of
    /// overflowing for large retry budgets.
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn call_once(&self, request: &GenerationRequest) -> Result<String> {
        let text = tokio::time::timeout(self.timeout, self.generator.generate(request))
            .await
            .map_err(|_| {
                DraftsmithError::generation(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })??;

        if text.trim().is_empty() {
            return Err(DraftsmithError::generation("service returned an empty completion"));
        }
        Ok(text)
    }
}

/// Decode a JSON-mode reply, tolerating a surrounding Markdown code fence.
fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        DraftsmithError::malformed(format!("{e} (got: {preview})"))
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
