//! Speech-to-text backend.

use crate::config::SttConfig;
use crate::error::VoiceError;
use async_trait::async_trait;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// A speech-to-text service.
///
/// An empty or whitespace-only transcript is a valid result, not an error;
/// the orchestrator decides what to do with it.
#[async_trait]
pub trait SttBackend: Send + Sync {
    /// Backend name for logs (e.g. "whisper").
    fn name(&self) -> &str;

    /// Transcribes the audio bytes to text.
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, VoiceError>;
}

/// Whisper-format transcription over HTTP.
///
/// Posts a multipart form to `{base_url}/audio/transcriptions` with bearer
/// auth, the layout OpenAI and compatible vendors accept.
#[derive(Debug, Clone)]
pub struct WhisperStt {
    config: SttConfig,
    client: reqwest::Client,
}

impl WhisperStt {
    pub fn new(config: SttConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/audio/transcriptions")
    }

    /// Maps a MIME type to a file extension for the multipart upload.
    fn mime_to_extension(mime_type: &str) -> &'static str {
        match mime_type {
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/mp3" | "audio/mpeg" => "mp3",
            "audio/ogg" => "ogg",
            "audio/webm" => "webm",
            _ => "wav",
        }
    }
}

#[async_trait]
impl SttBackend for WhisperStt {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, VoiceError> {
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let extension = Self::mime_to_extension(mime_type);
        let file_part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("audio.{extension}"))
            .mime_str(mime_type)
            .map_err(|e| VoiceError::Stt(format!("invalid mime type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("response_format", "json");

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Stt(format!("transcription request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "transcription backend returned {status}: {body}"
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VoiceError::Stt(format!("transcription response parse error: {e}")))?;

        Ok(body["text"].as_str().unwrap_or("").trim().to_string())
    }
}
