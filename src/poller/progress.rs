//! Cosmetic progress estimate shown while a report is being generated.
//!
//! The results API reports no real progress, so the estimate creeps up by a
//! random step on every tick and stalls below a ceiling until the session
//! reaches a terminal state.

use std::ops::RangeInclusive;
use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::config::PollConfig;
use crate::poller::clock::{sleep_or_cancel, Clock};
use crate::poller::session::SharedSession;

/// Randomized, capped, monotonically increasing progress value.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    value: u8,
    step: RangeInclusive<u8>,
    ceiling: u8,
}

impl ProgressEstimator {
    pub fn new(step: RangeInclusive<u8>, ceiling: u8) -> Self {
        Self {
            value: 0,
            step,
            ceiling: ceiling.min(99),
        }
    }

    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(config.progress_step.clone(), config.progress_ceiling)
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Advances by a random step and returns the new value (never above the
    /// ceiling).
    pub fn advance<R: Rng>(&mut self, rng: &mut R) -> u8 {
        let (low, high) = (*self.step.start(), *self.step.end());
        let step = if low >= high { low } else { rng.gen_range(low..=high) };
        self.value = self.value.saturating_add(step).min(self.ceiling);
        self.value
    }
}

/// Ticks the estimate into `session` until it turns terminal or is stopped.
pub(crate) async fn run_progress<R: Rng + Send>(
    session: SharedSession,
    clock: Arc<dyn Clock>,
    config: PollConfig,
    mut rng: R,
) {
    let mut estimator = ProgressEstimator::from_config(&config);
    let cancel = session.cancel_token().clone();

    loop {
        if !sleep_or_cancel(clock.as_ref(), config.progress_tick, &cancel).await {
            break;
        }
        if session.read(|s| s.state().is_terminal()) {
            break;
        }
        let next = estimator.advance(&mut rng);
        session.update(|s| s.set_progress(next));
    }

    debug!(
        "[POLL] progress ticker for {} stopped at {}",
        session.read(|s| s.identifier().redacted()),
        estimator.value()
    );
}
