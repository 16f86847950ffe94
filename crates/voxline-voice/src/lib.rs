//! Speech and language backends for the voxline pipeline.
//!
//! Three concerns, each behind an async trait so the orchestrator (and tests)
//! can substitute implementations: speech-to-text ([`SttBackend`]),
//! conversational reply generation ([`ChatBackend`]), and text-to-speech
//! ([`TtsBackend`]). The shipped implementations talk to OpenAI-format HTTP
//! APIs, which most hosted STT/LLM/TTS vendors expose.

pub mod chat;
pub mod config;
pub mod error;
pub mod stt;
pub mod tts;

pub use chat::{ChatBackend, ChatMessage, OpenAiChat};
pub use config::{ChatConfig, SttConfig, TtsConfig};
pub use error::VoiceError;
pub use stt::{SttBackend, WhisperStt};
pub use tts::{OpenAiTts, TtsBackend};
