//! Pipeline stage errors.
//!
//! Each variant corresponds to one stage of the pipeline; [`PipelineError::kind`]
//! maps it onto the error taxonomy API clients see. The conversation responder
//! has no variant here: its failures degrade the reply instead of failing the
//! session.

use thiserror::Error;
use voxline_types::{ErrorKind, TransitionError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("usage exceeded for account {0}")]
    UsageExceeded(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("speech synthesis failed: {0}")]
    Tts(String),

    #[error(transparent)]
    State(#[from] TransitionError),
}

impl PipelineError {
    /// The error kind recorded on the failed session and reported to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UsageExceeded(_) => ErrorKind::UsageExceeded,
            Self::Download(_) => ErrorKind::Download,
            Self::Transcription(_) => ErrorKind::Transcription,
            Self::Tts(_) => ErrorKind::Tts,
            Self::State(_) => ErrorKind::Internal,
        }
    }
}
