//! Per-call session state and the pipeline status state machine.
//!
//! A [`CallSession`] tracks one recorded utterance from webhook receipt to a
//! terminal state. Status transitions are monotonic along the pipeline order;
//! `Completed` and `Failed` are terminal and mutually exclusive, and a session
//! never re-enters a prior stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage of a call session.
///
/// Ordered along the pipeline: each successful stage moves the session
/// strictly forward. The empty-transcript shortcut skips `Generating`
/// (the status order permits skipping forward, never moving back).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Received,
    Downloading,
    Downloaded,
    Transcribing,
    Transcribed,
    Generating,
    Generated,
    Synthesizing,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Position of this status along the pipeline, used to enforce
    /// forward-only transitions.
    fn rank(self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Downloading => 1,
            Self::Downloaded => 2,
            Self::Transcribing => 3,
            Self::Transcribed => 4,
            Self::Generating => 5,
            Self::Generated => 6,
            Self::Synthesizing => 7,
            Self::Completed => 8,
            Self::Failed => 8,
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the lowercase wire label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Transcribing => "transcribing",
            Self::Transcribed => "transcribed",
            Self::Generating => "generating",
            Self::Generated => "generated",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error kinds exposed to API clients when a session fails.
///
/// An empty transcript is a control-flow condition (fallback reply), not an
/// error kind; a degraded responder reply is recorded on the session but does
/// not fail it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed webhook payload. No session is created for these; the kind
    /// exists so the receiver can report them in the same taxonomy.
    #[serde(rename = "ValidationError")]
    Validation,
    /// The usage gate rejected the account before any backend was touched.
    UsageExceeded,
    /// Fetching the remote recording failed.
    #[serde(rename = "DownloadError")]
    Download,
    /// The speech-to-text backend failed.
    #[serde(rename = "TranscriptionError")]
    Transcription,
    /// The text-to-speech backend failed, or the output could not be persisted.
    #[serde(rename = "TTSError")]
    Tts,
    /// A broken pipeline invariant (e.g. an illegal status transition).
    #[serde(rename = "InternalError")]
    Internal,
}

impl ErrorKind {
    /// Returns the wire label for this kind (`errorKind` in responses).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::UsageExceeded => "UsageExceeded",
            Self::Download => "DownloadError",
            Self::Transcription => "TranscriptionError",
            Self::Tts => "TTSError",
            Self::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error recorded on a failed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Rejected status transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// One end-to-end processing of a single recorded utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Opaque unique token assigned at receipt.
    pub session_id: String,
    /// Provider correlation id.
    pub call_id: String,
    pub caller_number: String,
    pub called_number: String,
    pub recording_url: String,
    pub status: SessionStatus,
    pub transcript: Option<String>,
    pub reply_text: Option<String>,
    /// Set when the responder backend failed and a static apology was
    /// substituted. The session still completes.
    pub reply_degraded: bool,
    pub output_audio_path: Option<PathBuf>,
    pub error: Option<SessionError>,
    pub created_at: DateTime<Utc>,
}

impl CallSession {
    /// Creates a fresh session in the `Received` state.
    pub fn new(
        session_id: impl Into<String>,
        call_id: impl Into<String>,
        caller_number: impl Into<String>,
        called_number: impl Into<String>,
        recording_url: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            call_id: call_id.into(),
            caller_number: caller_number.into(),
            called_number: called_number.into(),
            recording_url: recording_url.into(),
            status: SessionStatus::Received,
            transcript: None,
            reply_text: None,
            reply_degraded: false,
            output_audio_path: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Advances the session to `next`.
    ///
    /// Transitions must move strictly forward along the pipeline order and
    /// never leave a terminal state. `Failed` is reached through [`fail`],
    /// not through `advance`.
    ///
    /// [`fail`]: CallSession::fail
    pub fn advance(&mut self, next: SessionStatus) -> Result<(), TransitionError> {
        let rejected = self.status.is_terminal()
            || next == SessionStatus::Failed
            || next.rank() <= self.status.rank();
        if rejected {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Moves the session to `Failed` with the given error, from any
    /// non-terminal state. A terminal session is left untouched.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SessionStatus::Failed;
        self.error = Some(SessionError {
            kind,
            message: message.into(),
        });
    }
}
