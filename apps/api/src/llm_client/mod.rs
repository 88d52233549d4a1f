/// LLM Client — the single point of entry for chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the OpenAI API directly.
/// Handlers depend on the `CompletionService` trait so the backend can be
/// swapped (or faked in tests) without touching the pipeline.
///
/// Model: gpt-4 (hardcoded — do not make configurable to prevent drift)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// The model used for all feedback completions.
pub const MODEL: &str = "gpt-4";
pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Role tag of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// An ordered system + user message pair. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    messages: [ChatMessage; 2],
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: [
                ChatMessage {
                    role: Role::System,
                    content: system.into(),
                },
                ChatMessage {
                    role: Role::User,
                    content: user.into(),
                },
            ],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[cfg(test)]
    pub fn system(&self) -> &str {
        &self.messages[0].content
    }

    pub fn user(&self) -> &str {
        &self.messages[1].content
    }
}

/// Sampling options sent with every request. `None` leaves the provider default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
        }
    }
}

/// A chat-completion backend. Carried in `AppState` as `Arc<dyn CompletionService>`.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the content of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatCompletionResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
    code: Option<String>,
}

/// OpenAI chat-completions client. The API key is read once at startup.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
    options: CompletionOptions,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(config.completion_timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()?,
            api_key: config.openai_api_key.clone(),
            endpoint: format!("{}/chat/completions", config.openai_base_url),
            options: CompletionOptions::default(),
        })
    }

    /// Makes a raw call to the chat completions API, returning the full response object.
    /// Failures are returned as-is; nothing is retried.
    pub async fn call(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let body = request_body(request, &self.options);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| match e.error.code {
                    Some(code) => format!("{} ({code})", e.error.message),
                    None => e.error.message,
                })
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: scrub_credential(&message, &self.api_key),
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&response.text().await?)?;

        if let Some(usage) = &completion.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(completion)
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let response = self.call(request).await?;
        response
            .text()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

fn request_body<'a>(
    request: &'a CompletionRequest,
    options: &CompletionOptions,
) -> ChatCompletionBody<'a> {
    ChatCompletionBody {
        model: MODEL,
        messages: request.messages(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    }
}

/// Removes the API key, and anything shaped like an OpenAI key, from a provider message.
/// OpenAI echoes a masked key back on auth failures.
pub fn scrub_credential(message: &str, api_key: &str) -> String {
    let message = if api_key.is_empty() {
        message.to_string()
    } else {
        message.replace(api_key, "[REDACTED]")
    };

    let mut scrubbed = String::with_capacity(message.len());
    let mut rest = message.as_str();
    while let Some(pos) = rest.find("sk-") {
        let (before, from_prefix) = rest.split_at(pos);
        scrubbed.push_str(before);
        // "sk-" inside a longer word (e.g. "task-") is not a key
        let starts_token = scrubbed
            .chars()
            .next_back()
            .map_or(true, |c| !is_key_char(c));
        if starts_token {
            let end = from_prefix
                .find(|c: char| !is_key_char(c))
                .unwrap_or(from_prefix.len());
            scrubbed.push_str("[REDACTED]");
            rest = &from_prefix[end..];
        } else {
            scrubbed.push_str("sk-");
            rest = &from_prefix["sk-".len()..];
        }
    }
    scrubbed.push_str(rest);
    scrubbed
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '*')
}
