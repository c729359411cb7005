//! Ordered chat backend chain (spec.md §9 design note).
//!
//! Grounded on `original_source/advanced_module.py`'s `_anthropic_chat` /
//! `_openai_chat` attempt list (`[("local", ...), ("claude", ...), ("openai", ...)]`)
//! and on the teacher's `rag::response::RagEngine` for the OpenAI call shape.

use super::ratelimit::RateLimiter;
use crate::error::{YtCoreError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use tracing::{instrument, warn};

/// A single chat completion call: system prompt + user prompt in, text out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, system: &str, user: &str, model: &str) -> Result<String>;
}

/// OpenAI Chat Completions backend.
pub struct OpenAiChatBackend {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
}

impl OpenAiChatBackend {
    pub fn new() -> Self {
        Self { client: create_client() }
    }
}

impl Default for OpenAiChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, system, user))]
    async fn complete(&self, system: &str, user: &str, model: &str) -> Result<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| YtCoreError::ProviderContract(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| YtCoreError::ProviderContract(e.to_string()))?
                .into(),
        ];
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| YtCoreError::ProviderContract(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| YtCoreError::ProviderTransient(format!("openai: {e}")))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| YtCoreError::ProviderContract("openai: empty response".to_string()))
    }
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    error: Option<serde_json::Value>,
}

/// Anthropic Messages API backend, rate-limited client-side (`VIDEO_CLAUDE_RPM`).
pub struct ClaudeChatBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: RateLimiter,
}

impl ClaudeChatBackend {
    pub fn new(rpm: u32, timeout_sec: u64) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| YtCoreError::Config("ANTHROPIC_API_KEY not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| YtCoreError::Config(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            limiter: RateLimiter::new(rpm),
        })
    }
}

#[async_trait]
impl ChatBackend for ClaudeChatBackend {
    fn name(&self) -> &str {
        "claude"
    }

    #[instrument(skip(self, system, user))]
    async fn complete(&self, system: &str, user: &str, model: &str) -> Result<String> {
        self.limiter.acquire().await;

        let body = serde_json::json!({
            "model": model,
            "max_tokens": 2048,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let resp = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| YtCoreError::ProviderTransient(format!("claude: {e}")))?;

        let status = resp.status();
        let parsed: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| YtCoreError::ProviderContract(format!("claude: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(YtCoreError::ProviderTransient(format!("claude_error: {err}")));
        }
        if !status.is_success() {
            return Err(YtCoreError::ProviderTransient(format!("claude_http_{status}")));
        }

        let text: String = parsed.content.into_iter().map(|b| b.text).collect();
        if text.trim().is_empty() {
            return Err(YtCoreError::ProviderContract("claude: empty response".to_string()));
        }
        Ok(text)
    }
}

/// Deterministic, LLM-free backend: a crude extractive fallback so the
/// chain always has a final resort that never fails for unreachable
/// network reasons (spec.md §4.5 local-fallback requirement).
pub struct LocalChatBackend;

#[async_trait]
impl ChatBackend for LocalChatBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, _system: &str, user: &str, _model: &str) -> Result<String> {
        let excerpt: String = user.chars().take(800).collect();
        Ok(format!("(local fallback — no LLM reachable)\n{excerpt}"))
    }
}

/// An ordered list of chat backends, attempted in turn until one succeeds.
pub struct ChatChain {
    backends: Vec<Box<dyn ChatBackend>>,
}

impl ChatChain {
    pub fn new(backends: Vec<Box<dyn ChatBackend>>) -> Self {
        Self { backends }
    }

    /// Build from config names (e.g. `["claude", "openai", "local"]`);
    /// unknown names are skipped with a warning, never a hard error.
    pub fn from_names(names: &[String], settings: &crate::config::ProviderSettings) -> Self {
        let mut backends: Vec<Box<dyn ChatBackend>> = Vec::new();
        for name in names {
            match name.as_str() {
                "openai" => backends.push(Box::new(OpenAiChatBackend::new())),
                "claude" | "anthropic" => match ClaudeChatBackend::new(settings.claude_rpm, settings.timeout_sec) {
                    Ok(b) => backends.push(Box::new(b)),
                    Err(e) => warn!("skipping claude backend: {e}"),
                },
                "local" => backends.push(Box::new(LocalChatBackend)),
                other => warn!("unknown chat backend '{other}', skipping"),
            }
        }
        if backends.is_empty() {
            backends.push(Box::new(LocalChatBackend));
        }
        Self { backends }
    }

    #[instrument(skip(self, system, user))]
    pub async fn complete(&self, system: &str, user: &str, model: &str) -> Result<(String, String)> {
        let mut last_err = None;
        for backend in &self.backends {
            match backend.complete(system, user, model).await {
                Ok(text) => return Ok((text, backend.name().to_string())),
                Err(e) => {
                    warn!("chat backend '{}' failed: {e}", backend.name());
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| YtCoreError::ProviderTransient("no chat backends configured".to_string())))
    }

    /// Try each backend in priority order; `validate` inspects the raw text
    /// and returns `Some` to accept or `None` to fall through to the next
    /// backend (spec.md §4.5 step 8: a non-JSON or contract-violating reply
    /// is "insufficient", not a hard error, and falls through the chain).
    #[instrument(skip(self, system, user, validate))]
    pub async fn complete_each<T>(
        &self,
        system: &str,
        user: &str,
        model: &str,
        mut validate: impl FnMut(&str, &str) -> Option<T>,
    ) -> Option<T> {
        for backend in &self.backends {
            match backend.complete(system, user, model).await {
                Ok(text) => {
                    if let Some(t) = validate(backend.name(), &text) {
                        return Some(t);
                    }
                }
                Err(e) => warn!("chat backend '{}' failed: {e}", backend.name()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_never_fails() {
        let chain = ChatChain::new(vec![Box::new(LocalChatBackend)]);
        let (text, backend) = chain.complete("sys", "hello", "none").await.unwrap();
        assert_eq!(backend, "local");
        assert!(text.contains("hello"));
    }
}
