use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("STT error: {0}")]
    Stt(String),

    #[error("chat error: {0}")]
    Chat(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
