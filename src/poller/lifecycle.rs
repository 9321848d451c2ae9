//! Owner of the active poll session.
//!
//! [`ReportWatcher`] starts a session when asked to watch a report, replaces
//! it when the identifier changes, and stops it on `stop()` or drop. It is the
//! only place cancellation is initiated. Consumers read state through
//! [`ReportWatcher::subscribe`] or [`ReportWatcher::snapshot`].

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PollConfig;
use crate::poller::clock::{Clock, TokioClock};
use crate::poller::progress::run_progress;
use crate::poller::scheduler::{PollScheduler, StatusSource};
use crate::poller::session::{SessionSnapshot, SharedSession};
use crate::results::ReportIdentifier;

/// A running session and the tasks driving it.
struct ActiveSession {
    session: SharedSession,
    poll_task: Option<JoinHandle<SessionSnapshot>>,
    progress_task: JoinHandle<()>,
}

impl ActiveSession {
    fn stop(&self) {
        self.session.stop();
        self.progress_task.abort();
    }
}

/// Watches one report at a time and publishes its snapshots.
///
/// `watch` spawns tokio tasks, so it must be called from within a runtime.
pub struct ReportWatcher {
    source: Arc<dyn StatusSource>,
    clock: Arc<dyn Clock>,
    config: PollConfig,
    updates: Arc<watch::Sender<SessionSnapshot>>,
    current: Option<ActiveSession>,
}

impl ReportWatcher {
    pub fn new(source: Arc<dyn StatusSource>, config: PollConfig) -> Self {
        Self::with_clock(source, Arc::new(TokioClock), config)
    }

    pub fn with_clock(
        source: Arc<dyn StatusSource>,
        clock: Arc<dyn Clock>,
        config: PollConfig,
    ) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::idle());
        Self {
            source,
            clock,
            config,
            updates: Arc::new(updates),
            current: None,
        }
    }

    /// Starts watching `identifier`.
    ///
    /// Returns `false` if that report is already being watched. Any other
    /// session is stopped first and the new one starts from a clean
    /// `Loading` snapshot.
    pub fn watch(&mut self, identifier: ReportIdentifier) -> bool {
        if let Some(active) = &self.current {
            let same = active.session.read(|s| s.identifier() == &identifier);
            if same && !active.session.is_stopped() {
                return false;
            }
        }
        self.stop();

        info!("[WATCH] Watching report {}", identifier.redacted());

        let session =
            SharedSession::new(identifier, self.updates.clone(), CancellationToken::new());

        let scheduler = PollScheduler::new(
            self.source.clone(),
            self.clock.clone(),
            self.config.clone(),
            session.clone(),
        );
        let poll_task = scheduler.spawn();

        let progress_task = tokio::spawn(run_progress(
            session.clone(),
            self.clock.clone(),
            self.config.clone(),
            StdRng::from_entropy(),
        ));

        self.current = Some(ActiveSession {
            session,
            poll_task: Some(poll_task),
            progress_task,
        });
        true
    }

    /// Stops the active session, if any. The last snapshot stays readable.
    /// Idempotent.
    pub fn stop(&mut self) {
        if let Some(active) = &self.current {
            if !active.session.is_stopped() {
                info!(
                    "[WATCH] Stopping report {}",
                    active.session.read(|s| s.identifier().redacted())
                );
            }
            active.stop();
        }
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.updates.borrow().clone()
    }

    /// Waits for the active session's poll loop to exit (terminal or stopped)
    /// and returns its final snapshot. `None` if nothing is being watched or
    /// the loop was already awaited.
    pub async fn finished(&mut self) -> Option<SessionSnapshot> {
        let active = self.current.as_mut()?;
        let poll_task = active.poll_task.take()?;
        match poll_task.await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("[WATCH] Poll task ended abnormally: {}", e);
                Some(active.session.snapshot())
            }
        }
    }
}

impl Drop for ReportWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
