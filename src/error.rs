use serde::Serialize;
use thiserror::Error;

use crate::results::classifier::UNEXPECTED_RESPONSE_MESSAGE;

/// Patterns (lowercase) that indicate sensitive data not safe for UI display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "authorization:",
    "api_key",
    "x-api-key",
    "set-cookie",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for UI display.
/// If sensitive content is detected (or the message is blank), returns the fallback instead.
fn sanitize_message(msg: &str, fallback: &str) -> String {
    if msg.trim().is_empty() || contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for the results page.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Input ─────────────────────────────────────────────────────────────────
    #[error("Invalid report identifier")]
    InvalidIdentifier,

    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Results API ───────────────────────────────────────────────────────────
    #[error("Request failed with {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Lifecycle ─────────────────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message a poll session stores as its error detail.
    ///
    /// Server-supplied messages pass through (sanitized); everything else maps
    /// to a fixed, user-facing sentence.
    pub fn detail(&self) -> String {
        match self {
            AppError::Api { message, .. } => {
                sanitize_message(message, "Unable to load the report right now.")
            }
            AppError::UnexpectedResponse(_) => UNEXPECTED_RESPONSE_MESSAGE.into(),
            AppError::ConnectionFailed(_) => {
                "Could not reach the results service. Please check your connection.".into()
            }
            _ => "Unable to load the report right now.".into(),
        }
    }

    /// Converts the error into a user-friendly presentation suitable for UI display.
    /// Never leaks credentials or raw transport errors.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            AppError::InvalidIdentifier => ErrorPresentation {
                title: "Invalid Link".into(),
                message: "This report link is invalid or has expired.".into(),
                action: Some("Check the link and try again".into()),
            },

            AppError::Config(msg) => ErrorPresentation {
                title: "Configuration Error".into(),
                message: sanitize_message(msg, "The client is misconfigured."),
                action: Some("Fix the configuration and restart".into()),
            },

            AppError::Api { .. } | AppError::UnexpectedResponse(_) => ErrorPresentation {
                title: "Unable to load report".into(),
                message: self.detail(),
                action: Some("Try again".into()),
            },

            AppError::ConnectionFailed(_) => ErrorPresentation {
                title: "Connection Failed".into(),
                message: self.detail(),
                action: Some("Check network and retry".into()),
            },

            AppError::Cancelled => ErrorPresentation {
                title: "Cancelled".into(),
                message: "The operation was cancelled.".into(),
                action: None,
            },

            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
