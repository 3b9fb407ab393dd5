//! session.rs — Explicit session lifecycle.
//!
//! One authoritative `Phase` value replaces the pile of boolean flags the
//! UI would otherwise juggle (loading, started, loadingResult, ...).
//! Transitions are total: an event that does not apply in the current
//! phase is ignored and logged, never an error.
//!
//! Phases: Idle → Connecting → Live → FetchingResult → ResultReady, with
//! Error reachable from Connecting and FetchingResult, and Reset returning
//! to Idle from anywhere.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// The authoritative UI phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Live,
    FetchingResult,
    ResultReady,
    Error,
}

/// Lifecycle notification from the voice-assistant collaborator. The wire
/// spelling matches the assistant SDK event names.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssistantEvent {
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    VolumeLevel { level: f32 },
}

/// Full session snapshot. `result` holds the terminal call payload once
/// polling succeeds; it is cleared on reset, so a new session always
/// starts from a clean state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub assistant_speaking: bool,
    pub volume_level: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            call_id: None,
            assistant_speaking: false,
            volume_level: 0.0,
            error: None,
            result: None,
        }
    }
}

impl SessionState {
    /// A session was requested upstream and a call id was issued.
    pub fn begin_connecting(&mut self, call_id: String) {
        self.phase = Phase::Connecting;
        self.call_id = Some(call_id);
        self.error = None;
        self.result = None;
    }

    /// Apply one assistant lifecycle event. Out-of-phase events are
    /// dropped with a debug log.
    pub fn apply_event(&mut self, event: AssistantEvent) {
        match (self.phase, event) {
            (Phase::Connecting, AssistantEvent::CallStart) => {
                self.phase = Phase::Live;
            }
            (Phase::Live, AssistantEvent::CallEnd) => {
                self.finish_call();
            }
            (Phase::Live, AssistantEvent::SpeechStart) => {
                self.assistant_speaking = true;
            }
            (Phase::Live, AssistantEvent::SpeechEnd) => {
                self.assistant_speaking = false;
            }
            (Phase::Connecting | Phase::Live, AssistantEvent::VolumeLevel { level }) => {
                self.volume_level = level.clamp(0.0, 1.0);
            }
            (phase, event) => {
                debug!(target: "session", ?phase, ?event, "event ignored in current phase");
            }
        }
    }

    /// Live call ended (assistant hung up or the candidate stopped it);
    /// results are fetched next.
    pub fn finish_call(&mut self) {
        if self.phase == Phase::Live {
            self.phase = Phase::FetchingResult;
            self.assistant_speaking = false;
            self.volume_level = 0.0;
        }
    }

    /// Terminal poll success.
    pub fn result_ready(&mut self, result: Value) {
        self.phase = Phase::ResultReady;
        self.result = Some(result);
    }

    /// Start or poll failure; requires an explicit reset to leave.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = Phase::Error;
        self.error = Some(message.into());
        self.assistant_speaking = false;
        self.volume_level = 0.0;
    }

    /// Back to the intake form. Clears everything.
    pub fn reset(&mut self) {
        *self = SessionState::default();
    }
}

/// Thread-safe handle shared between the router and the poller task.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.read().expect("session lock poisoned").clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.read().expect("session lock poisoned").phase
    }

    pub fn call_id(&self) -> Option<String> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .call_id
            .clone()
    }

    pub fn begin_connecting(&self, call_id: String) {
        self.inner
            .write()
            .expect("session lock poisoned")
            .begin_connecting(call_id);
    }

    pub fn apply_event(&self, event: AssistantEvent) {
        self.inner
            .write()
            .expect("session lock poisoned")
            .apply_event(event);
    }

    pub fn finish_call(&self) {
        self.inner
            .write()
            .expect("session lock poisoned")
            .finish_call();
    }

    pub fn result_ready(&self, result: Value) {
        self.inner
            .write()
            .expect("session lock poisoned")
            .result_ready(result);
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.inner
            .write()
            .expect("session lock poisoned")
            .fail(message);
    }

    pub fn reset(&self) {
        self.inner.write().expect("session lock poisoned").reset();
    }
}
