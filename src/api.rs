//! api.rs — HTTP surface: intake, session lifecycle, call results.
//!
//! The router owns one `SessionHandle` + one `ResultPoller`: the service
//! tracks a single candidate session at a time, mirroring the one-form,
//! one-call screening flow. All error bodies are `{"error": "..."}` so the
//! UI renders them uniformly.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{info, warn};

use crate::assistant::{self, assemble_call_result, DynAssistantClient};
use crate::config::ScreenerConfig;
use crate::intake::Candidate;
use crate::metrics::{SESSIONS_STARTED, SESSION_START_FAILURES};
use crate::normalize;
use crate::poller::ResultPoller;
use crate::report::Report;
use crate::session::{AssistantEvent, Phase, SessionHandle, SessionState};

#[derive(Clone)]
pub struct AppState {
    pub assistant: DynAssistantClient,
    pub session: SessionHandle,
    pub poller: Arc<ResultPoller>,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new(assistant: DynAssistantClient, poll_interval: Duration) -> Self {
        Self {
            assistant,
            session: SessionHandle::new(),
            poller: Arc::new(ResultPoller::new()),
            poll_interval,
        }
    }

    /// Build from config + environment, the same way the binary does.
    pub fn from_env() -> Self {
        let cfg = ScreenerConfig::load();
        Self::new(assistant::build_client(&cfg.assistant), cfg.poll_interval())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/session", get(session_snapshot))
        .route("/session/start", post(session_start))
        .route("/session/event", post(session_event))
        .route("/session/stop", post(session_stop))
        .route("/session/reset", post(session_reset))
        .route("/call-details", get(call_details))
        .route("/report", get(report))
        .fallback_service(ServeDir::new("ui"))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

async fn session_start(
    State(state): State<AppState>,
    Json(candidate): Json<Candidate>,
) -> Result<Json<Value>, ApiError> {
    if let Err(e) = candidate.validate() {
        return Err(api_error(StatusCode::BAD_REQUEST, e.to_string()));
    }
    if state.session.phase() != Phase::Idle {
        return Err(api_error(
            StatusCode::CONFLICT,
            "A session is already in progress. Reset it first.",
        ));
    }

    match state.assistant.start_call(&candidate).await {
        Ok(started) => {
            counter!(SESSIONS_STARTED).increment(1);
            info!(target: "api", candidate = %candidate.anon_id(), call_id = %started.id, "session connecting");
            state.session.begin_connecting(started.id.clone());
            Ok(Json(json!({ "id": started.id })))
        }
        Err(e) => {
            counter!(SESSION_START_FAILURES).increment(1);
            warn!(target: "api", candidate = %candidate.anon_id(), error = %e, "session start failed");
            state.session.fail(e.to_string());
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

async fn session_event(
    State(state): State<AppState>,
    Json(event): Json<AssistantEvent>,
) -> Json<SessionState> {
    state.session.apply_event(event);
    start_polling_if_fetching(&state);
    Json(state.session.snapshot())
}

async fn session_stop(State(state): State<AppState>) -> Json<SessionState> {
    state.session.finish_call();
    start_polling_if_fetching(&state);
    Json(state.session.snapshot())
}

async fn session_reset(State(state): State<AppState>) -> Json<SessionState> {
    // Cancel before clearing state so a late poll result cannot
    // resurrect the old session.
    state.poller.cancel();
    state.session.reset();
    Json(state.session.snapshot())
}

async fn session_snapshot(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.session.snapshot())
}

/// Kick off polling when the session just entered FetchingResult. The
/// is_active guard keeps the single-task discipline on repeated stops.
fn start_polling_if_fetching(state: &AppState) {
    if state.session.phase() != Phase::FetchingResult || state.poller.is_active() {
        return;
    }
    let Some(call_id) = state.session.call_id() else {
        return;
    };
    state.poller.start(
        state.assistant.clone(),
        state.session.clone(),
        call_id,
        state.poll_interval,
    );
}

#[derive(Deserialize)]
struct CallQuery {
    #[serde(default)]
    call_id: String,
}

async fn call_details(
    State(state): State<AppState>,
    Query(q): Query<CallQuery>,
) -> Result<Json<Value>, ApiError> {
    let call_id = q.call_id.trim();
    if call_id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Call ID is required"));
    }
    match state.assistant.call_details(call_id).await {
        Ok(payload) => Ok(Json(assemble_call_result(&payload, call_id))),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

async fn report(
    State(state): State<AppState>,
    Query(q): Query<CallQuery>,
) -> Result<Json<Report>, ApiError> {
    let call_id = q.call_id.trim().to_string();

    // Serve the session's stored terminal result when it matches the
    // request; fetch fresh otherwise. The report itself is derived on
    // every request and never cached.
    let stored = state.session.snapshot().result.filter(|r| {
        call_id.is_empty()
            || r.get("call")
                .and_then(|c| c.get("id"))
                .and_then(Value::as_str)
                == Some(call_id.as_str())
    });

    let result = match stored {
        Some(result) => result,
        None => {
            if call_id.is_empty() {
                return Err(api_error(StatusCode::BAD_REQUEST, "Call ID is required"));
            }
            let payload = state
                .assistant
                .call_details(&call_id)
                .await
                .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;
            assemble_call_result(&payload, &call_id)
        }
    };

    Ok(Json(normalize::build_report(&result)))
}
