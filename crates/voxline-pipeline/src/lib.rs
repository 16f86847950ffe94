//! The voxline answering pipeline.
//!
//! One pipeline run per inbound completed-recording event: fetch the remote
//! recording into a session-scoped temp file, transcribe it, generate a
//! conversational reply from transcript plus bounded per-caller history,
//! synthesize the reply to audio, and persist it for the telephony layer to
//! deliver. Sessions are independent and run concurrently; every exit path
//! removes the session's temp input file.
//!
//! External collaborators (the usage gate consulted before any backend cost
//! is incurred, and the fire-and-forget analytics sink) are trait seams here;
//! HTTP implementations live in the server crate.

pub mod context;
pub mod error;
pub mod fetcher;
pub mod gate;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use context::ContextStore;
pub use error::PipelineError;
pub use fetcher::{HttpAudioFetcher, RecordingFetcher};
pub use gate::{
    AllowAllGate, AnalyticsSink, CallRecord, GateError, NullSink, SinkError, UsageDecision,
    UsageGate,
};
pub use orchestrator::{Pipeline, StageTimeouts, DEGRADED_REPLY, FALLBACK_REPLY};
pub use retry::RetryConfig;
pub use store::{MediaStore, StoreError};
