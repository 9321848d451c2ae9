//! Public results API: HTTP client, response classification, and the report
//! payload.
//!
//! - **client** fetches `/api/public/results/{id}` and returns the raw response
//! - **classifier** turns a raw response (or transport error) into an `Outcome`
//! - **payload** holds identifiers, the report body, and report sectioning

pub mod classifier;
pub mod client;
pub mod payload;

pub use classifier::{classify, Outcome, OutcomeKind};
pub use client::{PublicResultsClient, RawStatusResponse};
pub use payload::{report_sections, ReportIdentifier, ReportPayload, ReportSection};
