//! The per-session pipeline orchestrator.
//!
//! Runs the stages strictly in order — usage gate, download, transcription,
//! reply generation, synthesis — folding every stage failure into one
//! terminal `Failed` state with an error kind instead of an unhandled fault.
//! The conversation responder is the one exception: its failure degrades the
//! reply and the session still completes, because losing the call entirely is
//! worse than a canned answer.

use crate::context::ContextStore;
use crate::error::PipelineError;
use crate::fetcher::RecordingFetcher;
use crate::gate::{AnalyticsSink, CallRecord, UsageGate};
use crate::retry::{with_retry, RetryConfig};
use crate::store::MediaStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;
use voxline_types::{CallSession, ConversationTurn, RecordingEvent, SessionStatus};
use voxline_voice::{ChatBackend, ChatMessage, SttBackend, TtsBackend};

/// Canonical reply when transcription yields nothing usable.
pub const FALLBACK_REPLY: &str = "I didn't catch that, could you repeat?";

/// Static apology substituted when the responder backend fails.
pub const DEGRADED_REPLY: &str = "Sorry, I'm having trouble finding an answer right now.";

/// MIME type of provider recordings.
const RECORDING_MIME: &str = "audio/wav";

/// Per-stage deadlines. A hung backend call cannot hold a session's
/// resources longer than its stage budget allows.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub download: Duration,
    pub transcribe: Duration,
    pub respond: Duration,
    pub synthesize: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            download: Duration::from_secs(30),
            transcribe: Duration::from_secs(60),
            respond: Duration::from_secs(30),
            synthesize: Duration::from_secs(60),
        }
    }
}

/// One pipeline instance, shared by all concurrent sessions.
pub struct Pipeline {
    pub stt: Arc<dyn SttBackend>,
    pub chat: Arc<dyn ChatBackend>,
    pub tts: Arc<dyn TtsBackend>,
    pub gate: Arc<dyn UsageGate>,
    pub sink: Arc<dyn AnalyticsSink>,
    pub fetcher: Arc<dyn RecordingFetcher>,
    pub store: MediaStore,
    pub contexts: ContextStore,
    pub timeouts: StageTimeouts,
    pub retry: RetryConfig,
    /// Persona instruction for the responder.
    pub system_prompt: String,
    /// Voice identifier passed to synthesis.
    pub voice: String,
}

impl Pipeline {
    /// Runs one session to a terminal state.
    ///
    /// Always returns a session in `Completed` or `Failed`; the temp input
    /// file is removed on every exit path, and a completed call is reported
    /// to the analytics sink fire-and-forget.
    pub async fn run(&self, event: RecordingEvent) -> CallSession {
        let session_id = Uuid::new_v4().to_string();
        let mut session = CallSession::new(
            session_id,
            event.call_id,
            event.caller_number,
            event.called_number,
            event.recording_url,
        );
        info!(
            session_id = %session.session_id,
            call_id = %session.call_id,
            caller = %session.caller_number,
            duration_secs = event.recording_duration,
            "session received"
        );

        if let Err(e) = self.execute(&mut session).await {
            warn!(
                session_id = %session.session_id,
                kind = e.kind().as_str(),
                "session failed: {e}"
            );
            session.fail(e.kind(), e.to_string());
        }

        // Terminal either way; the input temp file goes now.
        self.store.cleanup(&session.session_id).await;

        if session.status == SessionStatus::Completed {
            info!(
                session_id = %session.session_id,
                degraded = session.reply_degraded,
                "session completed"
            );
            self.report(&session);
        }

        session
    }

    async fn execute(&self, session: &mut CallSession) -> Result<(), PipelineError> {
        // Quota gate first: an exhausted account must incur zero backend cost.
        match self.gate.check(&session.called_number).await {
            Ok(decision) if !decision.allowed => {
                return Err(PipelineError::UsageExceeded(session.called_number.clone()));
            }
            Ok(decision) => {
                info!(
                    session_id = %session.session_id,
                    remaining = decision.remaining,
                    "usage gate allowed session"
                );
            }
            Err(e) => {
                // The gate is an external collaborator; refusing every call
                // during its outage would take the whole line down.
                warn!(session_id = %session.session_id, "usage gate unavailable, allowing session: {e}");
            }
        }

        session.advance(SessionStatus::Downloading)?;
        let recording = self.store.recording_path(&session.session_id);
        {
            let fetcher = self.fetcher.as_ref();
            let url: &str = &session.recording_url;
            let dest: &std::path::Path = &recording;
            let deadline = self.timeouts.download;
            with_retry(&self.retry, "download", || async move {
                match timeout(deadline, fetcher.fetch(url, dest)).await {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::Download(format!(
                        "download timed out after {}s",
                        deadline.as_secs()
                    ))),
                }
            })
            .await?;
        }
        session.advance(SessionStatus::Downloaded)?;

        session.advance(SessionStatus::Transcribing)?;
        let audio = tokio::fs::read(&recording)
            .await
            .map_err(|e| PipelineError::Transcription(format!("failed to read recording: {e}")))?;
        let transcript = {
            let stt = self.stt.as_ref();
            let audio: &[u8] = &audio;
            let deadline = self.timeouts.transcribe;
            with_retry(&self.retry, "transcribe", || async move {
                match timeout(deadline, stt.transcribe(audio, RECORDING_MIME)).await {
                    Ok(result) => result.map_err(|e| PipelineError::Transcription(e.to_string())),
                    Err(_) => Err(PipelineError::Transcription(format!(
                        "transcription timed out after {}s",
                        deadline.as_secs()
                    ))),
                }
            })
            .await?
        };
        session.advance(SessionStatus::Transcribed)?;
        session.transcript = Some(transcript.clone());

        let reply = if transcript.trim().is_empty() {
            // Nothing usable was said: skip the responder entirely and answer
            // with the canonical fallback.
            info!(session_id = %session.session_id, "empty transcript, using fallback reply");
            session.advance(SessionStatus::Generated)?;
            FALLBACK_REPLY.to_string()
        } else {
            session.advance(SessionStatus::Generating)?;
            let reply = self.respond(session, &transcript).await;
            session.advance(SessionStatus::Generated)?;
            reply
        };
        session.reply_text = Some(reply.clone());

        session.advance(SessionStatus::Synthesizing)?;
        let reply_audio = {
            let tts = self.tts.as_ref();
            let text: &str = &reply;
            let voice: &str = &self.voice;
            let deadline = self.timeouts.synthesize;
            with_retry(&self.retry, "synthesize", || async move {
                match timeout(deadline, tts.synthesize(text, voice)).await {
                    Ok(result) => result.map_err(|e| PipelineError::Tts(e.to_string())),
                    Err(_) => Err(PipelineError::Tts(format!(
                        "synthesis timed out after {}s",
                        deadline.as_secs()
                    ))),
                }
            })
            .await?
        };
        let output = self
            .store
            .persist_reply(&session.session_id, &reply_audio)
            .await
            .map_err(|e| PipelineError::Tts(e.to_string()))?;
        session.output_audio_path = Some(output);

        session.advance(SessionStatus::Completed)?;
        Ok(())
    }

    /// Generates the reply for a non-empty transcript.
    ///
    /// Backend failure or timeout degrades to the static apology instead of
    /// failing the session. Only genuine model replies enter the caller's
    /// conversation history.
    async fn respond(&self, session: &mut CallSession, transcript: &str) -> String {
        let history = self.contexts.history(&session.caller_number);
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        for turn in &history {
            messages.push(ChatMessage::user(turn.user_text.as_str()));
            messages.push(ChatMessage::assistant(turn.reply_text.as_str()));
        }
        messages.push(ChatMessage::user(transcript));

        match timeout(self.timeouts.respond, self.chat.complete(&messages)).await {
            Ok(Ok(reply)) => {
                self.contexts.append(
                    &session.caller_number,
                    ConversationTurn::new(transcript, reply.as_str()),
                );
                reply
            }
            Ok(Err(e)) => {
                warn!(session_id = %session.session_id, "responder backend failed, degrading reply: {e}");
                session.reply_degraded = true;
                DEGRADED_REPLY.to_string()
            }
            Err(_) => {
                warn!(
                    session_id = %session.session_id,
                    "responder timed out after {}s, degrading reply",
                    self.timeouts.respond.as_secs()
                );
                session.reply_degraded = true;
                DEGRADED_REPLY.to_string()
            }
        }
    }

    /// Fire-and-forget analytics: failures are logged, never propagated.
    fn report(&self, session: &CallSession) {
        let record = CallRecord {
            caller_number: session.caller_number.clone(),
            transcript: session.transcript.clone().unwrap_or_default(),
            reply_text: session.reply_text.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        };
        let sink = Arc::clone(&self.sink);
        let session_id = session.session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.record(record).await {
                warn!(session_id = %session_id, "analytics sink failed: {e}");
            }
        });
    }
}
