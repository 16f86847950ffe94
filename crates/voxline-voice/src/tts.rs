//! Text-to-speech backend.

use crate::config::TtsConfig;
use crate::error::VoiceError;
use async_trait::async_trait;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// A text-to-speech service producing encoded audio bytes.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Backend name for logs (e.g. "openai-tts").
    fn name(&self) -> &str;

    /// Synthesizes speech for `text` with the given voice.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, VoiceError>;
}

/// OpenAI-format speech synthesis over HTTP.
///
/// Posts `{model, input, voice, response_format}` to `{base_url}/audio/speech`
/// and returns the raw response body (mp3).
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    config: TtsConfig,
    client: reqwest::Client,
}

impl OpenAiTts {
    pub fn new(config: TtsConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/audio/speech")
    }
}

#[async_trait]
impl TtsBackend for OpenAiTts {
    fn name(&self) -> &str {
        "openai-tts"
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
            "voice": voice,
            "response_format": "mp3",
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(format!("synthesis request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err_body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "synthesis backend returned {status}: {err_body}"
            )));
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| VoiceError::Tts(format!("synthesis response read error: {e}")))?;

        Ok(audio.to_vec())
    }
}
