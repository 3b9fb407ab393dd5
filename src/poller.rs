//! poller.rs — Fixed-interval result polling with a single-owner handle.
//!
//! After a call ends, the upstream needs a while to produce its analysis.
//! We re-fetch the call record at a fixed interval until the response is
//! terminal: a body with an `error` field stops polling as a failure, a
//! body carrying both `analysis` and `summary` stops it as success, and
//! anything else schedules another attempt. Retries are deliberately
//! unbounded: the upstream is trusted to eventually answer, and the
//! explicit reset transition is the escape hatch.
//!
//! Exactly one poll task exists at a time: starting a new poll replaces
//! (and aborts) the previous one, and cancellation is idempotent. The
//! task slot is taken out before aborting so a stale handle can never be
//! cleared twice.

use std::sync::Mutex;
use std::time::Duration;

use metrics::counter;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assistant::{assemble_call_result, DynAssistantClient};
use crate::metrics::{POLL_FAILURES, POLL_TICKS, RESULTS_READY};
use crate::normalize::is_blank;
use crate::session::SessionHandle;

/// Owns the single background poll task.
#[derive(Default)]
pub struct ResultPoller {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResultPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling `call_id`. Any previous poll is cancelled first, so
    /// at most one scheduled attempt ever exists.
    pub fn start(
        &self,
        client: DynAssistantClient,
        session: SessionHandle,
        call_id: String,
        interval: Duration,
    ) {
        let mut slot = self.task.lock().expect("poller slot poisoned");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(poll_loop(client, session, call_id, interval)));
    }

    /// Cancel any pending poll. Safe to call when nothing is pending.
    pub fn cancel(&self) {
        let taken = self.task.lock().expect("poller slot poisoned").take();
        if let Some(handle) = taken {
            handle.abort();
            debug!(target: "poller", "pending poll cancelled");
        }
    }

    /// True while a poll task is alive (terminal responses end the task).
    pub fn is_active(&self) -> bool {
        self.task
            .lock()
            .expect("poller slot poisoned")
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ResultPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Terminal classification of one poll response.
enum PollOutcome {
    Ready(Value),
    Failed(String),
    Retry,
}

fn classify(body: &Value) -> PollOutcome {
    if let Some(error) = body.get("error").filter(|v| !is_blank(v)) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return PollOutcome::Failed(message);
    }
    let analysis = body.get("analysis").filter(|v| !is_blank(v));
    let summary = body.get("summary").filter(|v| !is_blank(v));
    if analysis.is_some() && summary.is_some() {
        return PollOutcome::Ready(body.clone());
    }
    PollOutcome::Retry
}

async fn poll_loop(
    client: DynAssistantClient,
    session: SessionHandle,
    call_id: String,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // First tick completes immediately: the initial fetch goes out as
        // soon as the call ends, retries follow at the fixed interval.
        ticker.tick().await;
        counter!(POLL_TICKS).increment(1);

        let raw = match client.call_details(&call_id).await {
            Ok(raw) => raw,
            Err(e) => {
                counter!(POLL_FAILURES).increment(1);
                warn!(target: "poller", call_id = %call_id, error = %e, "result fetch failed");
                session.fail(e.to_string());
                return;
            }
        };

        match classify(&assemble_call_result(&raw, &call_id)) {
            PollOutcome::Ready(result) => {
                counter!(RESULTS_READY).increment(1);
                info!(target: "poller", call_id = %call_id, "analysis ready");
                session.result_ready(result);
                return;
            }
            PollOutcome::Failed(message) => {
                counter!(POLL_FAILURES).increment(1);
                warn!(target: "poller", call_id = %call_id, error = %message, "terminal error from upstream");
                session.fail(message);
                return;
            }
            PollOutcome::Retry => {
                debug!(target: "poller", call_id = %call_id, "analysis not ready yet");
            }
        }
    }
}
