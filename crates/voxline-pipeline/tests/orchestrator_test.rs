//! End-to-end orchestrator tests over mocked backends.
//!
//! Every backend records its call count so the short-circuit guarantees
//! (usage gate, empty transcript) can be asserted directly.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use voxline_pipeline::{
    AnalyticsSink, CallRecord, ContextStore, GateError, MediaStore, Pipeline, PipelineError,
    RecordingFetcher, RetryConfig, SinkError, StageTimeouts, UsageDecision, UsageGate,
    DEGRADED_REPLY, FALLBACK_REPLY,
};
use voxline_types::{ErrorKind, RecordingEvent, SessionStatus};
use voxline_voice::{ChatBackend, ChatMessage, SttBackend, TtsBackend, VoiceError};

struct MockFetcher {
    calls: AtomicUsize,
    /// Attempts that fail before one succeeds.
    fail_first: usize,
    payload: Option<Vec<u8>>,
}

impl MockFetcher {
    fn ok(payload: &[u8]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            payload: Some(payload.to_vec()),
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: usize::MAX,
            payload: None,
        }
    }

    fn flaky(fail_first: usize, payload: &[u8]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first,
            payload: Some(payload.to_vec()),
        }
    }
}

#[async_trait]
impl RecordingFetcher for MockFetcher {
    async fn fetch(&self, _url: &str, dest: &Path) -> Result<(), PipelineError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(PipelineError::Download("connection reset".to_string()));
        }
        let payload = self
            .payload
            .as_ref()
            .expect("ok fetcher must carry a payload");
        tokio::fs::write(dest, payload).await.unwrap();
        Ok(())
    }
}

struct MockStt {
    calls: AtomicUsize,
    result: Result<String, String>,
}

impl MockStt {
    fn ok(text: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Ok(text.to_string()),
        }
    }

    fn failing(msg: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Err(msg.to_string()),
        }
    }
}

#[async_trait]
impl SttBackend for MockStt {
    fn name(&self) -> &str {
        "mock-stt"
    }

    async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<String, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(VoiceError::Stt)
    }
}

struct MockChat {
    calls: AtomicUsize,
    result: Result<String, String>,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockChat {
    fn ok(text: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Ok(text.to_string()),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    fn failing(msg: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Err(msg.to_string()),
            last_messages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatBackend for MockChat {
    fn name(&self) -> &str {
        "mock-chat"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        self.result.clone().map_err(VoiceError::Chat)
    }
}

struct MockTts {
    calls: AtomicUsize,
    result: Result<Vec<u8>, String>,
}

impl MockTts {
    fn ok(audio: &[u8]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Ok(audio.to_vec()),
        }
    }

    fn failing(msg: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Err(msg.to_string()),
        }
    }
}

#[async_trait]
impl TtsBackend for MockTts {
    fn name(&self) -> &str {
        "mock-tts"
    }

    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(VoiceError::Tts)
    }
}

struct MockGate {
    allowed: bool,
    erroring: bool,
}

#[async_trait]
impl UsageGate for MockGate {
    async fn check(&self, _account_key: &str) -> Result<UsageDecision, GateError> {
        if self.erroring {
            return Err(GateError("gate unreachable".to_string()));
        }
        Ok(UsageDecision {
            allowed: self.allowed,
            remaining: if self.allowed { 10 } else { 0 },
        })
    }
}

struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<CallRecord>,
}

#[async_trait]
impl AnalyticsSink for ChannelSink {
    async fn record(&self, record: CallRecord) -> Result<(), SinkError> {
        let _ = self.tx.send(record);
        Ok(())
    }
}

struct Fixture {
    _tmp: TempDir,
    pipeline: Pipeline,
    fetcher: Arc<MockFetcher>,
    stt: Arc<MockStt>,
    chat: Arc<MockChat>,
    tts: Arc<MockTts>,
    records: tokio::sync::mpsc::UnboundedReceiver<CallRecord>,
}

fn fixture(
    fetcher: MockFetcher,
    stt: MockStt,
    chat: MockChat,
    tts: MockTts,
    gate: MockGate,
) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let store = MediaStore::new(tmp.path().join("recordings"), tmp.path().join("replies"));
    store.init().unwrap();

    let fetcher = Arc::new(fetcher);
    let stt = Arc::new(stt);
    let chat = Arc::new(chat);
    let tts = Arc::new(tts);
    let (tx, records) = tokio::sync::mpsc::unbounded_channel();

    let pipeline = Pipeline {
        stt: stt.clone(),
        chat: chat.clone(),
        tts: tts.clone(),
        gate: Arc::new(gate),
        sink: Arc::new(ChannelSink { tx }),
        fetcher: fetcher.clone(),
        store,
        contexts: ContextStore::new(10),
        timeouts: StageTimeouts::default(),
        retry: RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        system_prompt: "Be brief.".to_string(),
        voice: "alloy".to_string(),
    };

    Fixture {
        _tmp: tmp,
        pipeline,
        fetcher,
        stt,
        chat,
        tts,
        records,
    }
}

fn event() -> RecordingEvent {
    RecordingEvent {
        call_id: "CA-1".to_string(),
        caller_number: "+1000".to_string(),
        called_number: "+2000".to_string(),
        recording_url: "https://x/rec1.wav".to_string(),
        recording_duration: Some(3.5),
        call_status: "completed".to_string(),
    }
}

fn allowing() -> MockGate {
    MockGate {
        allowed: true,
        erroring: false,
    }
}

#[tokio::test]
async fn happy_path_completes_with_output_audio() {
    let mut f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("hello"),
        MockChat::ok("hi there"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.transcript.as_deref(), Some("hello"));
    assert_eq!(session.reply_text.as_deref(), Some("hi there"));
    assert!(!session.reply_degraded);
    assert!(session.error.is_none());

    let output = session.output_audio_path.expect("output path must be set");
    assert_eq!(std::fs::read(&output).unwrap().len(), 100);

    // The temp input recording is gone.
    let input = f.pipeline.store.recording_path(&session.session_id);
    assert!(!input.exists());

    // The completed call reached the analytics sink.
    let record = tokio::time::timeout(Duration::from_secs(1), f.records.recv())
        .await
        .expect("analytics record should arrive")
        .unwrap();
    assert_eq!(record.caller_number, "+1000");
    assert_eq!(record.transcript, "hello");
    assert_eq!(record.reply_text, "hi there");
}

#[tokio::test]
async fn exhausted_usage_gate_short_circuits_before_any_backend() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("hello"),
        MockChat::ok("hi there"),
        MockTts::ok(&[7u8; 100]),
        MockGate {
            allowed: false,
            erroring: false,
        },
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.unwrap().kind, ErrorKind::UsageExceeded);
    assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.stt.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.chat.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.tts.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gate_outage_fails_open() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("hello"),
        MockChat::ok("hi there"),
        MockTts::ok(&[7u8; 100]),
        MockGate {
            allowed: false,
            erroring: true,
        },
    );

    let session = f.pipeline.run(event()).await;
    assert_eq!(session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn empty_transcript_skips_responder_and_uses_fallback() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("   "),
        MockChat::ok("should never be used"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(f.chat.calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.reply_text.as_deref(), Some(FALLBACK_REPLY));
    assert!(!session.reply_degraded);
    // The fallback is still synthesized and delivered.
    assert_eq!(f.tts.calls.load(Ordering::SeqCst), 1);
    assert!(session.output_audio_path.is_some());
}

#[tokio::test]
async fn download_failure_is_fatal_before_transcription() {
    let f = fixture(
        MockFetcher::failing(),
        MockStt::ok("hello"),
        MockChat::ok("hi there"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.unwrap().kind, ErrorKind::Download);
    assert_eq!(f.stt.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.tts.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn transient_download_failure_is_retried() {
    let f = fixture(
        MockFetcher::flaky(1, b"RIFFwav"),
        MockStt::ok("hello"),
        MockChat::ok("hi there"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stt_failure_is_fatal() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::failing("backend 500"),
        MockChat::ok("hi there"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.unwrap().kind, ErrorKind::Transcription);
    assert_eq!(f.chat.calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.tts.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn responder_failure_degrades_instead_of_failing() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("what are your hours"),
        MockChat::failing("model overloaded"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.reply_degraded);
    assert_eq!(session.reply_text.as_deref(), Some(DEGRADED_REPLY));
    assert!(session.error.is_none());
    assert_eq!(f.tts.calls.load(Ordering::SeqCst), 1);
    // A degraded exchange does not enter the caller's history.
    assert!(f.pipeline.contexts.history("+1000").is_empty());
}

#[tokio::test]
async fn tts_failure_is_fatal_and_temp_file_is_removed() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("hello"),
        MockChat::ok("hi there"),
        MockTts::failing("voice backend down"),
        allowing(),
    );

    let session = f.pipeline.run(event()).await;

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.unwrap().kind, ErrorKind::Tts);
    assert!(session.output_audio_path.is_none());

    let input = f.pipeline.store.recording_path(&session.session_id);
    assert!(!input.exists(), "temp input must be removed on failure too");
}

#[tokio::test]
async fn second_call_carries_prior_history_to_responder() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("second question"),
        MockChat::ok("second answer"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );

    f.pipeline
        .contexts
        .append("+1000", voxline_types::ConversationTurn::new("first question", "first answer"));

    let session = f.pipeline.run(event()).await;
    assert_eq!(session.status, SessionStatus::Completed);

    let messages = f.chat.last_messages.lock().unwrap().clone();
    // system + prior user/assistant pair + current utterance.
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, "system");
    assert_eq!(messages[1].content, "first question");
    assert_eq!(messages[2].content, "first answer");
    assert_eq!(messages[3].content, "second question");

    // The new exchange was appended.
    let history = f.pipeline.contexts.history("+1000");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].user_text, "second question");
}

#[tokio::test]
async fn concurrent_sessions_do_not_interfere() {
    let f = fixture(
        MockFetcher::ok(b"RIFFwav"),
        MockStt::ok("hello"),
        MockChat::ok("hi there"),
        MockTts::ok(&[7u8; 100]),
        allowing(),
    );
    let pipeline = Arc::new(f.pipeline);

    let mut handles = Vec::new();
    for i in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let mut e = event();
            e.caller_number = format!("+1{i:03}");
            pipeline.run(e).await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let session = handle.await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(ids.insert(session.session_id.clone()), "session ids must be unique");
        let input = pipeline.store.recording_path(&session.session_id);
        assert!(!input.exists());
    }
}
