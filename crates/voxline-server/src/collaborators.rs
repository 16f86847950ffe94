//! HTTP clients for the external collaborators: usage gate and analytics sink.

use async_trait::async_trait;
use tracing::debug;
use voxline_pipeline::{AnalyticsSink, CallRecord, GateError, SinkError, UsageDecision, UsageGate};

/// Usage gate over HTTP.
///
/// Posts `{"accountKey": ...}` to the configured endpoint and expects
/// `{"allowed": bool, "remaining": int}` back.
#[derive(Debug, Clone)]
pub struct HttpUsageGate {
    client: reqwest::Client,
    url: String,
}

impl HttpUsageGate {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl UsageGate for HttpUsageGate {
    async fn check(&self, account_key: &str) -> Result<UsageDecision, GateError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "accountKey": account_key }))
            .send()
            .await
            .map_err(|e| GateError(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(GateError(format!("gate returned {}", resp.status())));
        }

        let decision: UsageDecision = resp
            .json()
            .await
            .map_err(|e| GateError(format!("response parse error: {e}")))?;

        debug!(account_key, allowed = decision.allowed, remaining = decision.remaining, "usage gate decision");
        Ok(decision)
    }
}

/// Analytics sink over HTTP. One POST per completed call.
#[derive(Debug, Clone)]
pub struct HttpAnalyticsSink {
    client: reqwest::Client,
    url: String,
}

impl HttpAnalyticsSink {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AnalyticsSink for HttpAnalyticsSink {
    async fn record(&self, record: CallRecord) -> Result<(), SinkError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&record)
            .send()
            .await
            .map_err(|e| SinkError(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(SinkError(format!("sink returned {}", resp.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use chrono::Utc;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn gate_parses_decision() {
        let app = Router::new().route(
            "/check",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["accountKey"], "+2000");
                Json(serde_json::json!({ "allowed": false, "remaining": 0 }))
            }),
        );
        let base = serve(app).await;

        let gate = HttpUsageGate::new(reqwest::Client::new(), format!("{base}/check"));
        let decision = gate.check("+2000").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn gate_non_success_is_an_error() {
        let app = Router::new().route(
            "/check",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;

        let gate = HttpUsageGate::new(reqwest::Client::new(), format!("{base}/check"));
        assert!(gate.check("+2000").await.is_err());
    }

    #[tokio::test]
    async fn sink_posts_record() {
        let app = Router::new().route(
            "/calls",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["callerNumber"], "+1000");
                assert_eq!(body["replyText"], "hi there");
                axum::http::StatusCode::NO_CONTENT
            }),
        );
        let base = serve(app).await;

        let sink = HttpAnalyticsSink::new(reqwest::Client::new(), format!("{base}/calls"));
        sink.record(CallRecord {
            caller_number: "+1000".into(),
            transcript: "hello".into(),
            reply_text: "hi there".into(),
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    }
}
