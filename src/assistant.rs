//! assistant.rs — Upstream voice-assistant API client.
//!
//! Provider abstraction over the external voice platform: start a live
//! interview session, fetch the raw call record. The platform's internal
//! protocol is out of scope; we only depend on "POST a call, GET a call".
//! A deterministic mock ships alongside the real client so the router and
//! poller are testable without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::AssistantConfig;
use crate::intake::Candidate;

/// A freshly created upstream session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartedCall {
    pub id: String,
}

#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Create a live interview session for the candidate.
    async fn start_call(&self, candidate: &Candidate) -> Result<StartedCall>;
    /// Raw call record, exactly as the upstream returns it.
    async fn call_details(&self, call_id: &str) -> Result<Value>;
    /// Provider name for diagnostics/headers.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynAssistantClient = Arc<dyn AssistantClient>;

/// Factory: build a client according to config and environment.
///
/// * If `ASSISTANT_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if no API key resolved, returns a disabled client.
/// * Else builds the real HTTP client.
pub fn build_client(config: &AssistantConfig) -> DynAssistantClient {
    if std::env::var("ASSISTANT_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockAssistant::with_terminal_fixture());
    }

    if config.api_key.trim().is_empty() {
        return Arc::new(DisabledAssistant);
    }

    Arc::new(HttpAssistantClient::new(config))
}

// ------------------------------------------------------------
// Real HTTP client
// ------------------------------------------------------------

pub struct HttpAssistantClient {
    http: reqwest::Client,
    base_url: String,
    assistant_id: String,
    api_key: String,
}

impl HttpAssistantClient {
    pub fn new(config: &AssistantConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("prequal-screener/0.1")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: config.base_url.clone(),
            assistant_id: config.assistant_id.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl AssistantClient for HttpAssistantClient {
    async fn start_call(&self, candidate: &Candidate) -> Result<StartedCall> {
        if self.assistant_id.is_empty() {
            bail!("No assistant id configured");
        }

        let body = json!({
            "assistantId": self.assistant_id,
            "assistantOverrides": { "variableValues": candidate.variable_values() },
            "metadata": { "candidate": candidate.full_name() },
        });

        let resp = self
            .http
            .post(format!("{}/call", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Unable to reach the assistant service")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            bail!("Assistant service responded with {status}: {detail}");
        }

        let payload: Value = resp
            .json()
            .await
            .context("Assistant start response was not JSON")?;
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Unable to start the assistant. Missing call id."))?;

        info!(target: "assistant", candidate = %candidate.anon_id(), call_id = %id, "session started");
        Ok(StartedCall { id })
    }

    async fn call_details(&self, call_id: &str) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}/call/{call_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Unable to reach the assistant service")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            bail!("Assistant service responded with {status}: {detail}");
        }

        resp.json()
            .await
            .context("Call details response was not JSON")
    }

    fn provider_name(&self) -> &'static str {
        "http"
    }
}

// ------------------------------------------------------------
// Disabled + mock clients
// ------------------------------------------------------------

/// Errors on every call; used when no API key is configured.
pub struct DisabledAssistant;

#[async_trait]
impl AssistantClient for DisabledAssistant {
    async fn start_call(&self, _candidate: &Candidate) -> Result<StartedCall> {
        bail!("Assistant is not configured (missing API key)")
    }
    async fn call_details(&self, _call_id: &str) -> Result<Value> {
        bail!("Assistant is not configured (missing API key)")
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic in-memory client for tests and local runs. Each
/// `call_details` pops the next queued response; once the queue is empty
/// the last response repeats.
pub struct MockAssistant {
    responses: Mutex<VecDeque<Value>>,
    last: Mutex<Value>,
    detail_requests: AtomicUsize,
    fail_details: bool,
}

impl MockAssistant {
    pub fn with_responses(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(json!({})),
            detail_requests: AtomicUsize::new(0),
            fail_details: false,
        }
    }

    /// One immediately-terminal response with analysis + summary, for
    /// smoke runs with `ASSISTANT_TEST_MODE=mock`.
    pub fn with_terminal_fixture() -> Self {
        Self::with_responses(vec![json!({
            "id": "mock-call-1",
            "summary": "Here's a summary of the interview: **solid** throughout.",
            "analysis": {
                "structuredData": {
                    "evaluation": { "scores": {
                        "confidence": 74, "knowledgeSkills": 68, "communication": 81,
                        "behaviour": 77, "problemSolving": 64, "adaptability": 70,
                        "cultureFit": 72
                    } },
                    "decision": { "status": "Qualified", "reason": "Meets the screening bar." }
                }
            },
            "startedAt": "2025-11-03T10:00:00Z",
            "endedAt": "2025-11-03T10:07:30Z",
            "duration": 450
        })])
    }

    /// Every `call_details` fails at the transport level.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            last: Mutex::new(json!({})),
            detail_requests: AtomicUsize::new(0),
            fail_details: true,
        }
    }

    /// Number of `call_details` requests issued so far.
    pub fn detail_requests(&self) -> usize {
        self.detail_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssistantClient for MockAssistant {
    async fn start_call(&self, _candidate: &Candidate) -> Result<StartedCall> {
        Ok(StartedCall {
            id: "mock-call-1".to_string(),
        })
    }

    async fn call_details(&self, _call_id: &str) -> Result<Value> {
        self.detail_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_details {
            bail!("mock transport failure");
        }
        let mut queue = self.responses.lock().expect("mock queue poisoned");
        match queue.pop_front() {
            Some(next) => {
                *self.last.lock().expect("mock last poisoned") = next.clone();
                Ok(next)
            }
            None => Ok(self.last.lock().expect("mock last poisoned").clone()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Call result assembly
// ------------------------------------------------------------

/// First candidate that is not null/""/[], cloned.
fn pick_first(candidates: &[Option<&Value>]) -> Option<Value> {
    candidates
        .iter()
        .flatten()
        .find(|v| !crate::normalize::is_blank(v))
        .map(|v| (**v).clone())
}

/// Assemble the `/call-details` response body from the raw upstream call
/// record: surface summary/structuredData/insights/transcript wherever the
/// producer put them, and collapse call metadata to one `call` object with
/// absent fields dropped.
pub fn assemble_call_result(payload: &Value, call_id: &str) -> Value {
    let analysis = payload.get("analysis").cloned().unwrap_or(Value::Null);
    let structured = pick_first(&[
        payload.get("structuredData"),
        analysis.get("structuredData"),
        analysis.get("structured_data"),
    ])
    .unwrap_or_else(|| json!({}));

    let fallback_id = json!(call_id);
    let mut call = Map::new();
    let call_fields: [(&str, Option<Value>); 5] = [
        (
            "id",
            pick_first(&[payload.get("id"), Some(&fallback_id)]),
        ),
        (
            "assistantId",
            pick_first(&[payload.get("assistantId"), payload.get("assistant_id")]),
        ),
        (
            "startedAt",
            pick_first(&[payload.get("startedAt"), payload.get("createdAt")]),
        ),
        (
            "endedAt",
            pick_first(&[payload.get("endedAt"), payload.get("completedAt")]),
        ),
        (
            "duration",
            pick_first(&[
                payload.get("duration"),
                payload.get("callDurationSeconds"),
                payload.get("call_duration_seconds"),
            ]),
        ),
    ];
    for (key, value) in call_fields {
        if let Some(value) = value {
            call.insert(key.to_string(), value);
        }
    }

    let mut body = Map::new();
    if let Some(summary) = pick_first(&[payload.get("summary"), analysis.get("summary")]) {
        body.insert("summary".to_string(), summary);
    }
    body.insert(
        "analysis".to_string(),
        if analysis.is_null() { json!({}) } else { analysis.clone() },
    );
    body.insert("structuredData".to_string(), structured);
    if let Some(insights) = pick_first(&[payload.get("insights"), analysis.get("insights")]) {
        body.insert("insights".to_string(), insights);
    }
    if let Some(transcript) = pick_first(&[
        payload.get("transcript"),
        payload.get("callTranscription"),
        payload.get("call_transcription"),
    ]) {
        body.insert("transcript".to_string(), transcript);
    }
    // An upstream error marker must survive assembly: consumers treat a
    // body with `error` as a terminal failure.
    if let Some(error) = pick_first(&[payload.get("error")]) {
        body.insert("error".to_string(), error);
    }
    body.insert("call".to_string(), Value::Object(call));

    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembly_surfaces_nested_summary_and_structured_data() {
        let payload = json!({
            "analysis": {
                "summary": "went well",
                "structured_data": { "status": "Qualified" }
            },
            "createdAt": "2025-11-03T10:00:00Z",
            "callDurationSeconds": 300
        });
        let body = assemble_call_result(&payload, "call-9");

        assert_eq!(body["summary"], "went well");
        assert_eq!(body["structuredData"]["status"], "Qualified");
        assert_eq!(body["call"]["id"], "call-9");
        assert_eq!(body["call"]["startedAt"], "2025-11-03T10:00:00Z");
        assert_eq!(body["call"]["duration"], 300);
        assert!(body["call"].get("endedAt").is_none());
    }

    #[test]
    fn top_level_fields_outrank_nested_ones() {
        let payload = json!({
            "summary": "top",
            "analysis": { "summary": "nested" },
            "id": "upstream-id",
            "startedAt": "s", "createdAt": "c"
        });
        let body = assemble_call_result(&payload, "query-id");
        assert_eq!(body["summary"], "top");
        assert_eq!(body["call"]["id"], "upstream-id");
        assert_eq!(body["call"]["startedAt"], "s");
    }

    #[test]
    fn upstream_error_marker_survives_assembly() {
        let body = assemble_call_result(&json!({ "error": "call not found" }), "c");
        assert_eq!(body["error"], "call not found");
    }

    #[test]
    fn empty_payload_still_assembles() {
        let body = assemble_call_result(&json!({}), "call-1");
        assert!(body.get("summary").is_none());
        assert_eq!(body["analysis"], json!({}));
        assert_eq!(body["structuredData"], json!({}));
        assert_eq!(body["call"]["id"], "call-1");
    }

    #[tokio::test]
    async fn mock_queue_pops_then_repeats_last() {
        let mock = MockAssistant::with_responses(vec![json!({"a": 1}), json!({"a": 2})]);
        let c = Candidate {
            first_name: "A".into(),
            last_name: "B".into(),
            email: "a@b.c".into(),
            phone: "1".into(),
        };
        assert_eq!(mock.start_call(&c).await.unwrap().id, "mock-call-1");
        assert_eq!(mock.call_details("x").await.unwrap()["a"], 1);
        assert_eq!(mock.call_details("x").await.unwrap()["a"], 2);
        assert_eq!(mock.call_details("x").await.unwrap()["a"], 2);
        assert_eq!(mock.detail_requests(), 3);
    }
}
