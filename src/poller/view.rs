//! User-facing text for a session snapshot.

use serde::Serialize;

use crate::poller::session::{SessionSnapshot, SessionState};

/// Words cycled through while a report is generating.
pub const THINKING_WORDS: &[&str] = &[
    "Thinking",
    "Scanning",
    "Synthesizing",
    "Connecting dots",
    "Reading signals",
    "Assembling insights",
];

const FALLBACK_THINKING_WORD: &str = "Thinking";

/// Title and message describing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusPresentation {
    pub title: String,
    pub message: String,
}

impl StatusPresentation {
    fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl SessionSnapshot {
    /// Converts the snapshot into text for display.
    pub fn presentation(&self) -> StatusPresentation {
        match self.state {
            SessionState::Loading => StatusPresentation::new(
                "Generating your report...",
                "Loading report status.",
            ),
            SessionState::Pending => StatusPresentation::new(
                "Generating your report...",
                "Your report is in progress. We are checking for updates.",
            ),
            SessionState::NotFound => StatusPresentation::new(
                "Report not found",
                "This report link is invalid or has expired.",
            ),
            SessionState::Failed => StatusPresentation::new(
                "Report failed",
                self.detail_or("We could not complete this scan. Please try again later."),
            ),
            SessionState::Error => StatusPresentation::new(
                "Unable to load report",
                self.detail_or("Unable to load the report right now."),
            ),
            SessionState::Ready => match &self.report {
                Some(report) => StatusPresentation::new(
                    report.display_company(),
                    format!("Confidence level: {}", report.display_confidence()),
                ),
                None => StatusPresentation::new("Report", "Confidence level: Unspecified"),
            },
        }
    }

    fn detail_or(&self, fallback: &str) -> String {
        match self.error_detail.as_deref() {
            Some(detail) if !detail.trim().is_empty() => detail.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// Picks the word shown on the given animation tick.
pub fn thinking_word<'a>(words: &[&'a str], tick: usize) -> &'a str {
    if words.is_empty() {
        return FALLBACK_THINKING_WORD;
    }
    words[tick % words.len()]
}
