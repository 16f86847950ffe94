//! Inbound telephony webhook payload.

use serde::{Deserialize, Serialize};

/// Call status value that triggers pipeline processing. Anything else
/// (in-progress, partial recordings) is acknowledged and dropped.
pub const CALL_STATUS_COMPLETED: &str = "completed";

/// A recording callback from the telephony provider.
///
/// All fields are optional on the wire; the receiver validates the ones the
/// pipeline actually requires (`recordingUrl`, `callerNumber`) and rejects
/// the event before any session is created if they are missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingEvent {
    #[serde(rename = "callId", default)]
    pub call_id: String,

    /// The caller (From).
    #[serde(rename = "callerNumber", default)]
    pub caller_number: String,

    /// The provisioned line that was dialed (To). Also the account key for
    /// the usage gate.
    #[serde(rename = "calledNumber", default)]
    pub called_number: String,

    #[serde(rename = "recordingUrl", default)]
    pub recording_url: String,

    /// Recording length in seconds, when the provider supplies it.
    #[serde(rename = "recordingDuration", default)]
    pub recording_duration: Option<f64>,

    #[serde(rename = "callStatus", default)]
    pub call_status: String,
}

impl RecordingEvent {
    /// Whether this event signals a completed recording ready for processing.
    pub fn is_completed(&self) -> bool {
        self.call_status == CALL_STATUS_COMPLETED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_fields() {
        let json = r#"{
            "callId": "CA123",
            "callerNumber": "+1000",
            "calledNumber": "+2000",
            "recordingUrl": "https://x/rec1.wav",
            "recordingDuration": 4.2,
            "callStatus": "completed"
        }"#;
        let event: RecordingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.call_id, "CA123");
        assert_eq!(event.caller_number, "+1000");
        assert_eq!(event.called_number, "+2000");
        assert_eq!(event.recording_url, "https://x/rec1.wav");
        assert_eq!(event.recording_duration, Some(4.2));
        assert!(event.is_completed());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let event: RecordingEvent = serde_json::from_str("{}").unwrap();
        assert!(event.call_id.is_empty());
        assert!(event.recording_url.is_empty());
        assert!(event.recording_duration.is_none());
        assert!(!event.is_completed());
    }

    #[test]
    fn in_progress_is_not_completed() {
        let event = RecordingEvent {
            call_status: "in-progress".to_string(),
            ..Default::default()
        };
        assert!(!event.is_completed());
    }
}
