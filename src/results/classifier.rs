//! Status classification for public results responses.
//!
//! The results API reports progress through a mix of HTTP status codes and a
//! loosely-typed `status` field. `classify` is the single place where those
//! shapes are interpreted; everything downstream only sees [`Outcome`].

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AppError;
use crate::results::client::RawStatusResponse;
use crate::results::payload::ReportPayload;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Shown when the server reports a failed scan without a message.
pub const DEFAULT_FAILED_MESSAGE: &str = "We could not complete this scan. Please try again later.";

/// Shown for bodies that cannot be interpreted.
pub const UNEXPECTED_RESPONSE_MESSAGE: &str = "Unexpected response from server.";

/// Status values that mark a finished report.
const DONE_MARKERS: &[&str] = &["complete", "completed", "done"];

/// Raw error bodies are cut to this many characters before being shown.
const MAX_RAW_MESSAGE_CHARS: usize = 200;

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized result of one status query.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The report is ready.
    Success(Box<ReportPayload>),
    /// No report exists for the identifier.
    NotFound,
    /// The scan failed server-side.
    Failed(String),
    /// The report is still being generated.
    Pending,
    /// The response could not be interpreted or never arrived.
    Error(String),
}

/// Coarse grouping of outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Business outcome; polling ends.
    Terminal,
    /// Expected intermediate state; polling continues.
    NonTerminal,
    /// Wire-level error. A session still stops on it; nothing re-fetches
    /// automatically.
    Retryable,
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) | Outcome::NotFound | Outcome::Failed(_) => OutcomeKind::Terminal,
            Outcome::Pending => OutcomeKind::NonTerminal,
            Outcome::Error(_) => OutcomeKind::Retryable,
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::NotFound => "not_found",
            Outcome::Failed(_) => "failed",
            Outcome::Pending => "pending",
            Outcome::Error(_) => "error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a status query result onto an [`Outcome`].
///
/// HTTP status takes precedence over the body: 202 is pending, 404 not found,
/// 500 failed, and any other non-2xx an error. 2xx bodies are then read by
/// their `status` field and `customer_report` content.
pub fn classify(result: Result<RawStatusResponse, AppError>) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(e) => return Outcome::Error(e.detail()),
    };

    match response.status {
        202 => return Outcome::Pending,
        404 => return Outcome::NotFound,
        500 => {
            let message = parse_object(&response.body)
                .and_then(|body| string_field(&body, "message"))
                .unwrap_or_default();
            return Outcome::Failed(failed_message(&message));
        }
        _ if !response.is_success() => return Outcome::Error(error_message(&response)),
        _ => {}
    }

    if response.body.trim().is_empty() {
        // Nothing usable yet
        return Outcome::Pending;
    }

    match parse_object(&response.body) {
        Some(body) => classify_body(body),
        None => unexpected("body is not a JSON object".into()),
    }
}

fn classify_body(body: Map<String, Value>) -> Outcome {
    let status = match body.get("status") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => return unexpected("status field is not a string".into()),
    };

    match status {
        Some("pending") => return Outcome::Pending,
        Some("not_found") => return Outcome::NotFound,
        Some("failed") => {
            let message = string_field(&body, "message").unwrap_or_default();
            return Outcome::Failed(failed_message(&message));
        }
        Some(other) if !DONE_MARKERS.contains(&other) => {
            return unexpected(format!("unknown status '{}'", other));
        }
        _ => {}
    }

    let has_report = body
        .get("customer_report")
        .and_then(Value::as_str)
        .is_some_and(|report| !report.trim().is_empty());
    if !has_report {
        return Outcome::Pending;
    }

    match serde_json::from_value::<ReportPayload>(Value::Object(body)) {
        Ok(payload) => Outcome::Success(Box::new(payload)),
        Err(e) => unexpected(format!("report payload did not decode: {}", e)),
    }
}

/// Server message if present and non-blank, else the fixed default.
fn failed_message(message: &str) -> String {
    if message.trim().is_empty() {
        DEFAULT_FAILED_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

/// Picks the most specific message out of an error response.
///
/// Order: `error`, `message`, `errors[0].message`, raw body text, then a
/// generic `Request failed with <status>`.
fn error_message(response: &RawStatusResponse) -> String {
    let from_json = parse_object(&response.body).and_then(|body| {
        string_field(&body, "error")
            .or_else(|| string_field(&body, "message"))
            .or_else(|| {
                body.get("errors")
                    .and_then(Value::as_array)
                    .and_then(|errors| errors.first())
                    .and_then(Value::as_object)
                    .and_then(|first| string_field(first, "message"))
            })
    });

    let message = from_json.unwrap_or_else(|| {
        let raw = response.body.trim();
        if raw.is_empty() {
            format!("Request failed with {}", response.status)
        } else {
            raw.chars().take(MAX_RAW_MESSAGE_CHARS).collect()
        }
    });

    AppError::Api {
        status: response.status,
        message,
    }
    .detail()
}

fn parse_object(body: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Error outcome for a body that cannot be interpreted. The reason is only
/// logged; the session sees the fixed message.
fn unexpected(reason: String) -> Outcome {
    let err = AppError::UnexpectedResponse(reason);
    debug!("[RESULTS] {}", err);
    Outcome::Error(err.detail())
}

/// Non-blank string field.
fn string_field(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(status: u16, body: Value) -> Result<RawStatusResponse, AppError> {
        Ok(RawStatusResponse::json(status, body))
    }

    fn raw(status: u16, body: &str) -> Result<RawStatusResponse, AppError> {
        Ok(RawStatusResponse::new(status, body))
    }

    fn complete_body() -> Value {
        json!({
            "status": "complete",
            "company": "Acme Inc",
            "customer_report": "Overview:\nAll good.",
            "createdAt": "2026-01-05T10:00:00Z",
            "metadata": { "confidence_level": "High" }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport failures
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn transport_failure_is_error_with_message() {
        let outcome = classify(Err(AppError::ConnectionFailed("refused".into())));
        match outcome {
            Outcome::Error(msg) => assert!(!msg.trim().is_empty()),
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_body_is_unexpected_error() {
        let outcome = classify(raw(200, "<html>oops</html>"));
        assert_eq!(outcome, Outcome::Error(UNEXPECTED_RESPONSE_MESSAGE.into()));
        assert_eq!(outcome.kind(), OutcomeKind::Retryable);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Not found
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn http_404_is_not_found() {
        assert_eq!(classify(raw(404, "")), Outcome::NotFound);
    }

    #[test]
    fn not_found_status_field_is_not_found() {
        assert_eq!(classify(ok(200, json!({ "status": "not_found" }))), Outcome::NotFound);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Failed
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn http_500_uses_server_message() {
        let outcome = classify(ok(500, json!({ "message": "Custom error message" })));
        assert_eq!(outcome, Outcome::Failed("Custom error message".into()));
    }

    #[test]
    fn http_500_without_body_uses_default_message() {
        let outcome = classify(raw(500, "Internal Server Error"));
        assert_eq!(outcome, Outcome::Failed(DEFAULT_FAILED_MESSAGE.into()));
    }

    #[test]
    fn failed_status_with_blank_message_uses_default() {
        let outcome = classify(ok(200, json!({ "status": "failed", "message": "  " })));
        assert_eq!(outcome, Outcome::Failed(DEFAULT_FAILED_MESSAGE.into()));
        assert_eq!(outcome.kind(), OutcomeKind::Terminal);
    }

    #[test]
    fn failed_status_keeps_server_message() {
        let outcome = classify(ok(200, json!({ "status": "failed", "message": "Quota hit" })));
        assert_eq!(outcome, Outcome::Failed("Quota hit".into()));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pending
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn http_202_is_pending_regardless_of_body() {
        assert_eq!(classify(raw(202, "")), Outcome::Pending);
        assert_eq!(classify(raw(202, "not json")), Outcome::Pending);
    }

    #[test]
    fn pending_status_field_is_pending() {
        let outcome = classify(ok(200, json!({ "status": "pending" })));
        assert_eq!(outcome, Outcome::Pending);
        assert_eq!(outcome.kind(), OutcomeKind::NonTerminal);
    }

    #[test]
    fn complete_without_report_is_pending() {
        let outcome = classify(ok(200, json!({ "status": "complete", "customer_report": "" })));
        assert_eq!(outcome, Outcome::Pending);
    }

    #[test]
    fn missing_status_and_report_is_pending() {
        assert_eq!(classify(ok(200, json!({ "company": "Acme" }))), Outcome::Pending);
    }

    #[test]
    fn empty_success_body_is_pending() {
        assert_eq!(classify(raw(200, "")), Outcome::Pending);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Success
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn complete_with_report_is_success() {
        match classify(ok(200, complete_body())) {
            Outcome::Success(payload) => {
                assert_eq!(payload.company.as_deref(), Some("Acme Inc"));
                assert_eq!(payload.customer_report, "Overview:\nAll good.");
                assert_eq!(payload.metadata.confidence_level.as_deref(), Some("High"));
            }
            other => panic!("Expected Success, got {:?}", other),
        }
    }

    #[test]
    fn null_metadata_is_still_success() {
        let outcome = classify(ok(
            200,
            json!({
                "status": "complete",
                "company": "Acme Inc",
                "customer_report": "Overview:\nAll good.",
                "metadata": null
            }),
        ));
        match outcome {
            Outcome::Success(payload) => {
                assert_eq!(payload.display_company(), "Acme Inc");
                assert_eq!(payload.display_confidence(), "Unspecified");
            }
            other => panic!("Expected Success, got {:?}", other),
        }
    }

    #[test]
    fn numeric_confidence_is_still_success() {
        let outcome = classify(ok(
            200,
            json!({
                "status": "complete",
                "customer_report": "Overview:\nAll good.",
                "createdAt": 1767607200,
                "metadata": { "confidence_level": 0.8 }
            }),
        ));
        match outcome {
            Outcome::Success(payload) => {
                assert_eq!(payload.display_confidence(), "0.8");
                assert_eq!(payload.created_at.as_deref(), Some("1767607200"));
            }
            other => panic!("Expected Success, got {:?}", other),
        }
    }

    #[test]
    fn report_without_status_is_success() {
        let outcome = classify(ok(200, json!({ "customer_report": "Body" })));
        assert!(matches!(outcome, Outcome::Success(_)));
    }

    #[test]
    fn done_markers_are_accepted() {
        for marker in DONE_MARKERS {
            let outcome = classify(ok(200, json!({ "status": marker, "customer_report": "Body" })));
            assert!(matches!(outcome, Outcome::Success(_)), "marker {}", marker);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Unexpected
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn unknown_status_is_unexpected_error() {
        let outcome = classify(ok(200, json!({ "status": "exploded", "customer_report": "x" })));
        assert_eq!(outcome, Outcome::Error(UNEXPECTED_RESPONSE_MESSAGE.into()));
    }

    #[test]
    fn non_string_status_is_unexpected_error() {
        let outcome = classify(ok(200, json!({ "status": 3 })));
        assert_eq!(outcome, Outcome::Error(UNEXPECTED_RESPONSE_MESSAGE.into()));
    }

    #[test]
    fn json_array_body_is_unexpected_error() {
        let outcome = classify(ok(200, json!(["pending"])));
        assert_eq!(outcome, Outcome::Error(UNEXPECTED_RESPONSE_MESSAGE.into()));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Other non-2xx
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn other_error_prefers_error_field() {
        let outcome = classify(ok(403, json!({ "error": "Forbidden", "message": "ignored" })));
        assert_eq!(outcome, Outcome::Error("Forbidden".into()));
    }

    #[test]
    fn other_error_falls_back_to_message_then_errors_array() {
        let outcome = classify(ok(400, json!({ "message": "Bad id" })));
        assert_eq!(outcome, Outcome::Error("Bad id".into()));

        let outcome = classify(ok(422, json!({ "errors": [{ "message": "id too long" }] })));
        assert_eq!(outcome, Outcome::Error("id too long".into()));
    }

    #[test]
    fn other_error_uses_raw_text_then_generic_message() {
        let outcome = classify(raw(502, "Bad Gateway"));
        assert_eq!(outcome, Outcome::Error("Bad Gateway".into()));

        let outcome = classify(raw(503, ""));
        assert_eq!(outcome, Outcome::Error("Request failed with 503".into()));
    }

    #[test]
    fn other_error_truncates_long_raw_bodies() {
        let body = "x".repeat(1000);
        match classify(raw(502, &body)) {
            Outcome::Error(msg) => assert_eq!(msg.chars().count(), MAX_RAW_MESSAGE_CHARS),
            other => panic!("Expected Error, got {:?}", other),
        }
    }
}
