//! External collaborator seams: usage gate and analytics sink.
//!
//! Both live outside this system; the pipeline consumes them through narrow
//! traits. The gate is consulted before any backend cost is incurred. The
//! sink receives completed-call records fire-and-forget; its failure must
//! never fail a session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verdict from the usage gate for one account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageDecision {
    pub allowed: bool,
    pub remaining: i64,
}

#[derive(Debug, Error)]
#[error("usage gate error: {0}")]
pub struct GateError(pub String);

/// Quota/entitlement check consulted before the download stage.
#[async_trait]
pub trait UsageGate: Send + Sync {
    async fn check(&self, account_key: &str) -> Result<UsageDecision, GateError>;
}

/// Permissive gate used when no gate endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct AllowAllGate;

#[async_trait]
impl UsageGate for AllowAllGate {
    async fn check(&self, _account_key: &str) -> Result<UsageDecision, GateError> {
        Ok(UsageDecision {
            allowed: true,
            remaining: i64::MAX,
        })
    }
}

/// A completed call, as reported to the analytics sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(rename = "callerNumber")]
    pub caller_number: String,
    pub transcript: String,
    #[serde(rename = "replyText")]
    pub reply_text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
#[error("analytics sink error: {0}")]
pub struct SinkError(pub String);

/// Receives completed-call records after a session completes.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, record: CallRecord) -> Result<(), SinkError>;
}

/// Discards records; used when no sink endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct NullSink;

#[async_trait]
impl AnalyticsSink for NullSink {
    async fn record(&self, _record: CallRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
