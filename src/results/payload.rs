//! Report identifiers, the report payload, and report body sectioning.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// ReportIdentifier
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque public identifier of a scan report (the last path segment of a
/// results link).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportIdentifier(String);

impl ReportIdentifier {
    /// Wraps a raw identifier, rejecting empty or whitespace-only values.
    pub fn new(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidIdentifier);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form safe for log lines.
    pub fn redacted(&self) -> String {
        redact_id(&self.0)
    }
}

impl fmt::Display for ReportIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Redacts an identifier for logging (shows first 8 chars).
pub(crate) fn redact_id(id: &str) -> String {
    match id.char_indices().nth(8) {
        Some((cut, _)) => format!("{}...", &id[..cut]),
        None => id.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReportPayload
// ─────────────────────────────────────────────────────────────────────────────

/// A completed scan report as returned by the results API.
///
/// The poller treats this as pass-through data: fields it does not know about
/// are kept in `extra` and survive a serialize round trip. The display fields
/// are read leniently so an oddly shaped value never turns a finished report
/// into an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    #[serde(
        rename = "publicId",
        alias = "public_id",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub company: Option<String>,
    /// Free-text customer-facing report body.
    pub customer_report: String,
    #[serde(
        rename = "createdAt",
        alias = "created_at",
        default,
        deserialize_with = "lenient_text"
    )]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ReportPayload {
    /// Heading shown above the report.
    pub fn display_company(&self) -> &str {
        match self.company.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Report",
        }
    }

    /// Confidence label shown under the heading.
    pub fn display_confidence(&self) -> &str {
        match self.metadata.confidence_level.as_deref() {
            Some(level) if !level.trim().is_empty() => level,
            _ => "Unspecified",
        }
    }

    /// Splits the report body into displayable sections.
    pub fn sections(&self) -> Vec<ReportSection> {
        report_sections(&self.customer_report)
    }
}

/// Metadata attached to a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    #[serde(default, deserialize_with = "lenient_text")]
    pub confidence_level: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Reads a scalar as text. Numbers and booleans are rendered; null, arrays,
/// and objects become `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Reads metadata from an object; any other shape (including null) is empty.
fn lenient_metadata<'de, D>(deserializer: D) -> Result<ReportMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => {
            serde_json::from_value(Value::Object(map)).map_err(serde::de::Error::custom)
        }
        _ => Ok(ReportMetadata::default()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Headings longer than this are treated as body text.
const MAX_HEADING_LEN: usize = 80;

/// One block of a customer report, optionally led by a heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub heading: Option<String>,
    pub body: String,
}

/// Splits a report body into sections separated by blank lines.
///
/// The first line of a section becomes its heading when it looks like one
/// (see `is_heading`); otherwise the whole block is body text.
pub fn report_sections(report: &str) -> Vec<ReportSection> {
    split_blocks(report)
        .into_iter()
        .map(|block| {
            let lines: Vec<&str> = block.lines().filter(|l| !l.is_empty()).collect();
            let first = lines.first().copied().unwrap_or_default();
            if is_heading(first) {
                ReportSection {
                    heading: Some(normalize_heading(first)),
                    body: lines[1..].join("\n"),
                }
            } else {
                ReportSection {
                    heading: None,
                    body: block,
                }
            }
        })
        .collect()
}

/// Splits on runs of two or more newlines, trimming and dropping empty blocks.
fn split_blocks(report: &str) -> Vec<String> {
    let normalized = report.replace("\r\n", "\n");
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut newlines = 0usize;

    for ch in normalized.chars() {
        if ch == '\n' {
            newlines += 1;
            continue;
        }
        if newlines >= 2 {
            push_block(&mut blocks, &current);
            current.clear();
        } else if newlines == 1 {
            current.push('\n');
        }
        newlines = 0;
        current.push(ch);
    }
    push_block(&mut blocks, &current);
    blocks
}

fn push_block(blocks: &mut Vec<String>, block: &str) {
    let trimmed = block.trim();
    if !trimmed.is_empty() {
        blocks.push(trimmed.to_string());
    }
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADING_LEN || trimmed.ends_with('.') {
        return false;
    }
    if is_markdown_heading(trimmed) {
        return true;
    }
    if trimmed
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c.is_whitespace() || c == '-')
    {
        return true;
    }
    trimmed.ends_with(':')
}

/// `#`, `##`, ... followed by whitespace.
fn is_markdown_heading(line: &str) -> bool {
    let rest = line.trim_start_matches('#');
    rest.len() < line.len() && rest.starts_with(char::is_whitespace)
}

/// Strips a leading `Step N:` marker and markdown `#`s.
fn normalize_heading(line: &str) -> String {
    let without_step = strip_step_prefix(line);
    without_step
        .trim_start_matches('#')
        .trim_start()
        .to_string()
}

fn strip_step_prefix(line: &str) -> &str {
    let lower = line.to_ascii_lowercase();
    let Some(after_word) = lower.strip_prefix("step") else {
        return line;
    };
    let rest = after_word.trim_start();
    if rest.len() == after_word.len() {
        // "step" must be followed by whitespace
        return line;
    }
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return line;
    }
    let after_digits = rest[digits..].trim_start();
    let Some(after_sep) = after_digits
        .strip_prefix(':')
        .or_else(|| after_digits.strip_prefix('.'))
        .or_else(|| after_digits.strip_prefix('-'))
    else {
        return line;
    };
    let consumed = lower.len() - after_sep.trim_start().len();
    &line[consumed..]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
