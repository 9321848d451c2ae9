//! Poll loop for one report session.
//!
//! The scheduler issues a status fetch, classifies the response, applies the
//! outcome to the session, and, while the report is pending, waits one poll
//! interval before fetching again. Only one fetch is ever in flight per
//! session.
//!
//! Cancellation is cooperative: a fetch already on the wire is allowed to
//! finish, but its outcome is discarded once the session has been stopped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::PollConfig;
use crate::error::AppError;
use crate::poller::clock::{sleep_or_cancel, Clock};
use crate::poller::session::{SessionSnapshot, SessionState, SharedSession};
use crate::results::{
    classify, Outcome, PublicResultsClient, RawStatusResponse, ReportIdentifier,
};

/// Error detail stored when a report stays pending past the attempt cap.
pub const TIMEOUT_MESSAGE: &str = "Report is taking longer than expected.";

// ─────────────────────────────────────────────────────────────────────────────
// StatusSource
// ─────────────────────────────────────────────────────────────────────────────

/// The one operation the poller needs from the outside world.
///
/// Implemented by [`PublicResultsClient`]; tests provide scripted fakes.
pub trait StatusSource: Send + Sync {
    /// Fetches the raw status of a report.
    fn query_status<'a>(
        &'a self,
        id: &'a ReportIdentifier,
    ) -> Pin<Box<dyn Future<Output = Result<RawStatusResponse, AppError>> + Send + 'a>>;
}

impl StatusSource for PublicResultsClient {
    fn query_status<'a>(
        &'a self,
        id: &'a ReportIdentifier,
    ) -> Pin<Box<dyn Future<Output = Result<RawStatusResponse, AppError>> + Send + 'a>> {
        Box::pin(async move { self.fetch_status(id).await })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PollScheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one [`SharedSession`] to a terminal state.
pub struct PollScheduler {
    source: Arc<dyn StatusSource>,
    clock: Arc<dyn Clock>,
    config: PollConfig,
    session: SharedSession,
}

impl PollScheduler {
    pub fn new(
        source: Arc<dyn StatusSource>,
        clock: Arc<dyn Clock>,
        config: PollConfig,
        session: SharedSession,
    ) -> Self {
        Self {
            source,
            clock,
            config,
            session,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Runs the poll loop on a tokio task.
    pub fn spawn(self) -> JoinHandle<SessionSnapshot> {
        tokio::spawn(self.run())
    }

    /// Polls until the session is terminal or stopped, returning the last
    /// snapshot.
    pub async fn run(self) -> SessionSnapshot {
        let id = self.session.read(|s| s.identifier().clone());
        let cancel = self.session.cancel_token().clone();
        // Never below one, even when the field was set directly
        let max_attempts = self.config.max_attempts.max(1);

        info!("[POLL] Session started for {}", id.redacted());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let outcome = classify(self.source.query_status(&id).await);
            let label = outcome.label();

            let applied = self.session.update(|s| {
                if !s.apply(outcome) {
                    return false;
                }
                if s.state() == SessionState::Pending && s.attempt() >= max_attempts {
                    s.apply(Outcome::Failed(TIMEOUT_MESSAGE.to_string()));
                }
                true
            });

            if !applied {
                debug!("[POLL] Discarded late '{}' outcome for {}", label, id.redacted());
                break;
            }

            let (state, attempt) = self.session.read(|s| (s.state(), s.attempt()));
            if state.is_terminal() {
                info!(
                    "[POLL] Session for {} finished: {} after {} pending attempt(s)",
                    id.redacted(),
                    state.as_str(),
                    attempt
                );
                break;
            }

            debug!(
                "[POLL] {} still pending ({}/{}), next check in {}ms",
                id.redacted(),
                attempt,
                max_attempts,
                self.config.poll_interval.as_millis()
            );

            if !sleep_or_cancel(self.clock.as_ref(), self.config.poll_interval, &cancel).await {
                break;
            }
        }

        if cancel.is_cancelled() {
            info!("[POLL] Session for {} stopped", id.redacted());
        }

        self.session.snapshot()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Fakes
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// One scripted reply.
    #[derive(Clone)]
    pub(crate) enum Reply {
        Response(RawStatusResponse),
        ConnectionError,
    }

    impl Reply {
        pub(crate) fn json(status: u16, body: serde_json::Value) -> Self {
            Reply::Response(RawStatusResponse::json(status, body))
        }

        pub(crate) fn pending() -> Self {
            Reply::json(200, serde_json::json!({ "status": "pending" }))
        }

        pub(crate) fn complete(company: &str) -> Self {
            Reply::json(
                200,
                serde_json::json!({
                    "status": "complete",
                    "customer_report": "Overview:\nAll good.",
                    "company": company,
                    "metadata": { "confidence_level": "High" }
                }),
            )
        }
    }

    /// Status source that replays a script; the last reply repeats forever.
    ///
    /// With a gate installed, every fetch waits for `release()` before
    /// answering, so tests can stop a session while a fetch is in flight.
    pub(crate) struct FakeStatusSource {
        script: Mutex<VecDeque<Reply>>,
        last: Mutex<Option<Reply>>,
        calls: AtomicU32,
        in_flight: AtomicU32,
        max_in_flight: AtomicU32,
        gate: Option<Arc<Notify>>,
        started: Arc<Notify>,
    }

    impl FakeStatusSource {
        pub(crate) fn new(script: Vec<Reply>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
                in_flight: AtomicU32::new(0),
                max_in_flight: AtomicU32::new(0),
                gate: None,
                started: Arc::new(Notify::new()),
            }
        }

        pub(crate) fn gated(script: Vec<Reply>) -> Self {
            Self {
                gate: Some(Arc::new(Notify::new())),
                ..Self::new(script)
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn max_in_flight(&self) -> u32 {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        /// Resolves when the next fetch has started.
        pub(crate) async fn wait_started(&self) {
            self.started.notified().await;
        }

        /// Lets one gated fetch answer.
        pub(crate) fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn next_reply(&self) -> Reply {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match script.pop_front() {
                Some(reply) => {
                    *last = Some(reply.clone());
                    reply
                }
                None => last.clone().unwrap_or_else(Reply::pending),
            }
        }
    }

    impl StatusSource for FakeStatusSource {
        fn query_status<'a>(
            &'a self,
            _id: &'a ReportIdentifier,
        ) -> Pin<Box<dyn Future<Output = Result<RawStatusResponse, AppError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                self.started.notify_one();

                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }

                let reply = self.next_reply();
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                match reply {
                    Reply::Response(response) => Ok(response),
                    Reply::ConnectionError => Err(AppError::ConnectionFailed(
                        "Connection to results service failed".to_string(),
                    )),
                }
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
