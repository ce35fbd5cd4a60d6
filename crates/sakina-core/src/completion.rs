//! **Completion capability** — abstract LLM chat interface used by the
//! intent extractor and the response generator.
//!
//! Implement [`CompletionBackend`] for any provider. Two REST providers ship:
//! an OpenAI-compatible endpoint (`chat/completions`) and the Anthropic
//! messages API (used as the dual-model validator).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{SakinaError, SakinaResult};

/// One request to a completion capability.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instruction (dialect/clinical framing).
    pub system: String,
    /// User text.
    pub user: String,
    /// Sampling temperature; low values favor terse deterministic output.
    pub temperature: f32,
    /// Output token budget.
    pub max_tokens: u32,
    /// Per-request timeout; `None` defers to the client's transport timeout.
    pub timeout: Option<Duration>,
}

/// Backend that turns a prompt pair into raw reply text. Responses are not
/// assumed to be well-formed; callers extract structure tolerantly.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> SakinaResult<String>;
}

// OpenAI-compatible request/response shapes.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Production completion backend: any OpenAI-compatible `chat/completions`
/// endpoint. Uses `SAKINA_LLM_API_URL` (default https://api.openai.com/v1),
/// `SAKINA_LLM_API_KEY` (or `OPENAI_API_KEY`), and `SAKINA_LLM_MODEL`.
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Model: gpt-4o-mini (fast mode default), gpt-4o, etc.
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiCompletion {
    /// Build from environment: SAKINA_LLM_API_URL, SAKINA_LLM_API_KEY (or OPENAI_API_KEY), SAKINA_LLM_MODEL.
    pub fn from_env() -> SakinaResult<Self> {
        let base_url = std::env::var("SAKINA_LLM_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("SAKINA_LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                SakinaError::Config("completion requires SAKINA_LLM_API_KEY or OPENAI_API_KEY".to_string())
            })?;
        let model = std::env::var("SAKINA_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self::new(base_url, api_key, model)
    }

    /// Create with explicit config.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> SakinaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SakinaError::Generation(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Set the model (e.g. `gpt-4o` for the dual-model primary).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletion {
    async fn complete(&self, request: &CompletionRequest) -> SakinaResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let mut req = self.client.post(&url).bearer_auth(&self.api_key).json(&body);
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        let res = req
            .send()
            .await
            .map_err(|e| SakinaError::Generation(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SakinaError::Generation(format!(
                "completion API error {}: {}",
                status, body
            )));
        }
        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| SakinaError::Generation(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

// Anthropic messages API shapes.
#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Anthropic messages backend, used as the independent validator in
/// dual-model mode. Uses `ANTHROPIC_API_KEY` and `SAKINA_VALIDATOR_MODEL`.
#[derive(Debug, Clone)]
pub struct AnthropicCompletion {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    client: reqwest::Client,
}

impl AnthropicCompletion {
    pub fn from_env() -> SakinaResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| SakinaError::Config("validator requires ANTHROPIC_API_KEY".to_string()))?;
        let model = std::env::var("SAKINA_VALIDATOR_MODEL")
            .unwrap_or_else(|_| "claude-3-opus-20240229".to_string());
        Self::new("https://api.anthropic.com/v1", api_key, model)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> SakinaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SakinaError::Generation(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl CompletionBackend for AnthropicCompletion {
    async fn complete(&self, request: &CompletionRequest) -> SakinaResult<String> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
        };
        let mut req = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        let res = req
            .send()
            .await
            .map_err(|e| SakinaError::Generation(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SakinaError::Generation(format!(
                "validator API error {}: {}",
                status, body
            )));
        }
        let parsed: MessagesResponse = res
            .json()
            .await
            .map_err(|e| SakinaError::Generation(e.to_string()))?;
        Ok(parsed
            .content
            .first()
            .map(|b| b.text.clone())
            .unwrap_or_default())
    }
}

/// Placeholder completion: returns a canned reply and counts invocations so
/// tests can assert whether a pipeline stage consulted the model at all.
#[derive(Debug, Default)]
pub struct PlaceholderCompletion {
    response: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl PlaceholderCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Self::default()
        }
    }

    /// A backend whose every call errors, for degradation tests.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for PlaceholderCompletion {
    async fn complete(&self, request: &CompletionRequest) -> SakinaResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SakinaError::Generation("placeholder configured to fail".to_string()));
        }
        Ok(self
            .response
            .clone()
            .unwrap_or_else(|| format!("[completion placeholder: {} chars in]", request.user.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "s".into(),
            user: "مرحبا".into(),
            temperature: 0.2,
            max_tokens: 100,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn placeholder_counts_calls() {
        let backend = PlaceholderCompletion::with_response("تمام");
        assert_eq!(backend.calls(), 0);
        assert_eq!(backend.complete(&request()).await.unwrap(), "تمام");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn failing_placeholder_errors_but_still_counts() {
        let backend = PlaceholderCompletion::failing();
        assert!(backend.complete(&request()).await.is_err());
        assert_eq!(backend.calls(), 1);
    }
}
