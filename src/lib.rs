//! Client for the Signal Scan public results API.
//!
//! A report is generated asynchronously after a scan. [`ReportWatcher`] polls
//! its status until it reaches a terminal state and
//! publishes a [`SessionSnapshot`] on every change.

pub mod config;
pub mod error;
pub mod poller;
pub mod results;

pub use config::{ClientConfig, PollConfig};
pub use error::{AppError, ErrorPresentation};
pub use poller::{ReportWatcher, SessionSnapshot, SessionState};
pub use results::{PublicResultsClient, ReportIdentifier, ReportPayload};
