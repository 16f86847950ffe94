//! Shared types for the voxline answering pipeline.
//!
//! This crate provides the foundational types used across all voxline crates:
//! the inbound recording event, the per-call session and its status state
//! machine, the error-kind taxonomy exposed to API clients, and conversation
//! history turns.
//!
//! No crate in the workspace depends on anything *except* `voxline-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

pub mod context;
pub mod event;
pub mod session;

pub use context::ConversationTurn;
pub use event::RecordingEvent;
pub use session::{CallSession, ErrorKind, SessionError, SessionStatus, TransitionError};
