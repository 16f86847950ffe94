//! Conversational reply generation via a language-model backend.

use crate::config::ChatConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user", or "assistant".
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// A language-model backend that turns a conversation into a reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name for logs (e.g. "openai-chat").
    fn name(&self) -> &str;

    /// Generates the next assistant reply for the given messages.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, VoiceError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

/// OpenAI-format chat completions over HTTP.
///
/// Works with any endpoint that accepts the `{base_url}/chat/completions`
/// request shape by pointing `base_url` elsewhere.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    config: ChatConfig,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: ChatConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    fn name(&self) -> &str {
        "openai-chat"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, VoiceError> {
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            "sending chat completion request"
        );

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VoiceError::Chat(format!("completion request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Chat(format!(
                "completion backend returned {status}: {body}"
            )));
        }

        let body: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| VoiceError::Chat(format!("completion response parse error: {e}")))?;

        let reply = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| VoiceError::Chat("completion response had no choices".to_string()))?;

        Ok(reply.trim().to_string())
    }
}
