//! Report status polling.
//!
//! This module turns the raw status endpoint into a stream of session
//! snapshots. Key pieces:
//!
//! - **session** holds the reconciliation state machine and its shared cell
//! - **scheduler** runs the fetch / classify / wait loop with an attempt cap
//! - **progress** ticks a cosmetic progress estimate while in flight
//! - **lifecycle** owns the active session and is the only place it is stopped
//! - **clock** abstracts timers so loops can run without wall-clock waits

pub mod clock;
mod lifecycle;
mod progress;
pub mod scheduler;
pub mod session;
mod view;

pub use clock::{Clock, TokioClock};
pub use lifecycle::ReportWatcher;
pub use progress::ProgressEstimator;
pub use scheduler::{PollScheduler, StatusSource, TIMEOUT_MESSAGE};
pub use session::{PollSession, SessionSnapshot, SessionState, SharedSession};
pub use view::{thinking_word, StatusPresentation, THINKING_WORDS};
