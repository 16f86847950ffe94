//! Backend endpoint configuration.
//!
//! Each backend gets a base URL, an API key, and a model name. API keys are
//! redacted from `Debug` output so configs can be logged safely.

use serde::Deserialize;
use std::fmt;

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a friendly phone assistant. Keep replies short and conversational; \
     the caller hears them spoken aloud."
        .to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

/// Speech-to-text backend settings.
#[derive(Clone, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_openai_base")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base(),
            api_key: String::new(),
            model: default_stt_model(),
        }
    }
}

impl fmt::Debug for SttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SttConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// Language-model backend settings for the conversation responder.
#[derive(Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_openai_base")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Persona instruction prepended to every conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base(),
            api_key: String::new(),
            model: default_chat_model(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

/// Text-to-speech backend settings.
#[derive(Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_openai_base")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_tts_model")]
    pub model: String,
    /// Voice identifier passed to the synthesis endpoint.
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base(),
            api_key: String::new(),
            model: default_tts_model(),
            voice: default_voice(),
        }
    }
}

impl fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish()
    }
}
