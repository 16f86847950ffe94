//! Webhook API handlers.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use voxline_types::{RecordingEvent, SessionStatus};

/// API error type mapping to HTTP status codes.
///
/// Only malformed payloads surface as HTTP errors; pipeline failures are
/// reported in a well-formed `success: false` body so the telephony provider
/// sees a valid response either way.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::BadRequest(message) = self;
        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
            "errorKind": "ValidationError",
        }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

/// Response for a session that reached `completed`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCompletedResponse {
    pub success: bool,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub transcript: Option<String>,
    #[serde(rename = "replyText")]
    pub reply_text: Option<String>,
    #[serde(rename = "replyDegraded")]
    pub reply_degraded: bool,
    #[serde(rename = "outputAudioPath")]
    pub output_audio_path: Option<String>,
}

/// Response for a session that ended `failed`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionFailedResponse {
    pub success: bool,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub error: String,
    #[serde(rename = "errorKind")]
    pub error_kind: String,
}

/// Response for a non-"completed" callback: acknowledged, not processed.
#[derive(Debug, Serialize, Deserialize)]
pub struct IgnoredResponse {
    pub success: bool,
    pub ignored: bool,
    #[serde(rename = "callStatus")]
    pub call_status: String,
}

/// Handler for `POST /webhook/recording`.
///
/// Validates the payload, drops non-completed callbacks without creating a
/// session, and otherwise runs the full pipeline before responding — the
/// provider's request is held open for the duration of the session.
pub async fn recording_webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(event): Json<RecordingEvent>,
) -> Result<Response, ApiError> {
    if event.recording_url.trim().is_empty() {
        return Err(ApiError::BadRequest("recordingUrl is required".to_string()));
    }
    if event.caller_number.trim().is_empty() {
        return Err(ApiError::BadRequest("callerNumber is required".to_string()));
    }

    if !event.is_completed() {
        // Partial and in-progress recordings are never processed.
        return Ok(Json(IgnoredResponse {
            success: true,
            ignored: true,
            call_status: event.call_status,
        })
        .into_response());
    }

    let session = state.pipeline.run(event).await;

    match session.status {
        SessionStatus::Completed => Ok(Json(SessionCompletedResponse {
            success: true,
            session_id: session.session_id,
            transcript: session.transcript,
            reply_text: session.reply_text,
            reply_degraded: session.reply_degraded,
            output_audio_path: session
                .output_audio_path
                .map(|p| p.display().to_string()),
        })
        .into_response()),
        _ => {
            let (error, error_kind) = match session.error {
                Some(err) => (err.message, err.kind.as_str().to_string()),
                // A failed session always carries an error; this arm is a
                // wire-format backstop, not an expected path.
                None => ("unknown failure".to_string(), "InternalError".to_string()),
            };
            Ok(Json(SessionFailedResponse {
                success: false,
                session_id: session.session_id,
                error,
                error_kind,
            })
            .into_response())
        }
    }
}
