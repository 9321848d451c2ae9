//! Reconciliation state machine for one report.
//!
//! A [`PollSession`] starts in `Loading`, moves to `Pending` on the first
//! pending outcome, and ends in one of four absorbing terminal states. It is a
//! plain value: timing and cancellation are driven from outside.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::results::{Outcome, ReportIdentifier, ReportPayload};

// ─────────────────────────────────────────────────────────────────────────────
// SessionState
// ─────────────────────────────────────────────────────────────────────────────

/// State of a poll session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No status fetch has resolved yet.
    Loading,
    /// At least one pending outcome observed.
    Pending,
    /// Report available.
    Ready,
    /// No report for this identifier.
    NotFound,
    /// The scan failed or polling timed out.
    Failed,
    /// The response could not be loaded or interpreted.
    Error,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Pending => "pending",
            SessionState::Ready => "ready",
            SessionState::NotFound => "not_found",
            SessionState::Failed => "failed",
            SessionState::Error => "error",
        }
    }

    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }

    /// Returns true while the report is still being waited on.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionState::Loading | SessionState::Pending)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionSnapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only view of a session handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Report being watched; `None` before the first `watch`.
    pub identifier: Option<ReportIdentifier>,
    pub state: SessionState,
    /// Pending outcomes observed so far.
    pub attempt: u32,
    pub report: Option<ReportPayload>,
    pub error_detail: Option<String>,
    /// Cosmetic progress estimate, 0-100.
    pub progress: u8,
}

impl SessionSnapshot {
    /// Snapshot shown before any report is watched.
    pub fn idle() -> Self {
        Self {
            identifier: None,
            state: SessionState::Loading,
            attempt: 0,
            report: None,
            error_detail: None,
            progress: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PollSession
// ─────────────────────────────────────────────────────────────────────────────

/// Live unit of work for one report identifier.
///
/// Invariants:
/// - `report` is set only in `Ready`; `error_detail` only in `Failed`/`Error`
/// - terminal states are absorbing
/// - once cancelled, nothing changes
#[derive(Debug, Clone)]
pub struct PollSession {
    identifier: ReportIdentifier,
    state: SessionState,
    attempt: u32,
    report: Option<ReportPayload>,
    error_detail: Option<String>,
    progress: u8,
    cancelled: bool,
}

impl PollSession {
    pub fn new(identifier: ReportIdentifier) -> Self {
        Self {
            identifier,
            state: SessionState::Loading,
            attempt: 0,
            report: None,
            error_detail: None,
            progress: 0,
            cancelled: false,
        }
    }

    pub fn identifier(&self) -> &ReportIdentifier {
        &self.identifier
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn report(&self) -> Option<&ReportPayload> {
        self.report.as_ref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Applies a classified outcome.
    ///
    /// Returns `false` (and changes nothing) when the session is cancelled or
    /// already terminal.
    pub fn apply(&mut self, outcome: Outcome) -> bool {
        if self.cancelled || self.state.is_terminal() {
            return false;
        }

        match outcome {
            Outcome::Pending => {
                self.attempt += 1;
                self.state = SessionState::Pending;
            }
            Outcome::Success(payload) => {
                self.report = Some(*payload);
                self.progress = 100;
                self.state = SessionState::Ready;
            }
            Outcome::NotFound => {
                self.state = SessionState::NotFound;
            }
            Outcome::Failed(message) => {
                self.error_detail = Some(message);
                self.state = SessionState::Failed;
            }
            Outcome::Error(message) => {
                self.error_detail = Some(message);
                self.state = SessionState::Error;
            }
        }
        true
    }

    /// Raises the progress estimate. Ignored once terminal or cancelled, and
    /// never lowers the value.
    pub fn set_progress(&mut self, progress: u8) -> bool {
        if self.cancelled || self.state.is_terminal() || progress <= self.progress {
            return false;
        }
        self.progress = progress.min(100);
        true
    }

    /// Marks the session cancelled. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identifier: Some(self.identifier.clone()),
            state: self.state,
            attempt: self.attempt,
            report: self.report.clone(),
            error_detail: self.error_detail.clone(),
            progress: self.progress,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SharedSession
// ─────────────────────────────────────────────────────────────────────────────

/// A session shared between its poll task, its progress task, and the
/// controller that owns it.
///
/// Every accepted mutation publishes a fresh snapshot. Mutations are refused
/// once the cancellation token fires, checked under the lock, so a session
/// that has been stopped never publishes again.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    session: Mutex<PollSession>,
    updates: Arc<watch::Sender<SessionSnapshot>>,
    cancel: CancellationToken,
}

impl SharedSession {
    /// Wraps a fresh session and publishes its initial snapshot.
    pub fn new(
        identifier: ReportIdentifier,
        updates: Arc<watch::Sender<SessionSnapshot>>,
        cancel: CancellationToken,
    ) -> Self {
        let session = PollSession::new(identifier);
        updates.send_replace(session.snapshot());
        Self {
            inner: Arc::new(SessionInner {
                session: Mutex::new(session),
                updates,
                cancel,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollSession> {
        // The session is plain data; a panic elsewhere cannot leave it half-updated.
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Runs `f` against the session and publishes a snapshot if it reports a
    /// change. Refused after cancellation.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut PollSession) -> bool,
    {
        let mut session = self.lock();
        if self.inner.cancel.is_cancelled() || session.is_cancelled() {
            return false;
        }
        let changed = f(&mut session);
        if changed {
            self.inner.updates.send_replace(session.snapshot());
        }
        changed
    }

    /// Reads the session without mutating it.
    pub fn read<T>(&self, f: impl FnOnce(&PollSession) -> T) -> T {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Stops the session: fires the cancellation token, then marks the session
    /// cancelled under the lock. Once this returns no further snapshot is
    /// published. Idempotent.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
        self.lock().cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
