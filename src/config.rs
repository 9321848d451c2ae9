//! Client and poller configuration.
//!
//! Both configs have sensible defaults, builder-style setters, and an
//! environment loader so binaries can be tuned without recompiling.

use std::ops::RangeInclusive;
use std::time::Duration;

use url::Url;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Environment variable holding the results API base URL.
pub const ENV_API_BASE_URL: &str = "SIGNALSCAN_API_BASE_URL";

/// Environment variable holding the per-request timeout in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SIGNALSCAN_REQUEST_TIMEOUT_SECS";

/// Environment variable holding the poll interval in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "SIGNALSCAN_POLL_INTERVAL_MS";

/// Environment variable holding the maximum number of status fetches.
pub const ENV_MAX_POLL_ATTEMPTS: &str = "SIGNALSCAN_MAX_POLL_ATTEMPTS";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_PROGRESS_TICK_MS: u64 = 700;
const DEFAULT_PROGRESS_CEILING: u8 = 90;

// ─────────────────────────────────────────────────────────────────────────────
// ClientConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Connection settings for the public results API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the `/api/public/results/{id}` path is joined onto.
    pub base_url: Url,
    /// Timeout applied to every status request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // Constant literal, parsing cannot fail
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Creates a config for the given base URL.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Self::default()
        })
    }

    /// Replaces the base URL.
    pub fn base_url(mut self, base_url: &str) -> Result<Self, AppError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Loads the config from `SIGNALSCAN_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = match lookup(ENV_API_BASE_URL) {
            Some(raw) => Self::new(&raw)?,
            None => Self::default(),
        };
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = parse_number(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
            config = config.request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

/// Parses a base URL, normalizing it to end with a slash so `Url::join` keeps
/// any path prefix (e.g. `https://host/scan/`).
fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&normalized)
        .map_err(|e| AppError::Config(format!("Invalid base URL '{}': {}", trimmed, e)))?;
    if url.cannot_be_a_base() {
        return Err(AppError::Config(format!(
            "Base URL '{}' cannot carry a path",
            trimmed
        )));
    }
    Ok(url)
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", key, raw)))
}

// ─────────────────────────────────────────────────────────────────────────────
// PollConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Timing knobs for a poll session.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between a pending outcome and the next status fetch.
    pub poll_interval: Duration,
    /// Maximum number of status fetches per session.
    pub max_attempts: u32,
    /// Interval between progress estimate ticks.
    pub progress_tick: Duration,
    /// Inclusive range the random progress increment is drawn from.
    pub progress_step: RangeInclusive<u8>,
    /// Soft ceiling the estimate never crosses while in flight.
    pub progress_ceiling: u8,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress_tick: Duration::from_millis(DEFAULT_PROGRESS_TICK_MS),
            progress_step: 2..=7,
            progress_ceiling: DEFAULT_PROGRESS_CEILING,
        }
    }
}

impl PollConfig {
    /// Sets the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the attempt cap. Values below 1 are raised to 1.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the progress tick interval.
    pub fn progress_tick(mut self, tick: Duration) -> Self {
        self.progress_tick = tick;
        self
    }

    /// Sets the progress increment range.
    pub fn progress_step(mut self, step: RangeInclusive<u8>) -> Self {
        self.progress_step = step;
        self
    }

    /// Sets the in-flight progress ceiling (clamped to 99).
    pub fn progress_ceiling(mut self, ceiling: u8) -> Self {
        self.progress_ceiling = ceiling.min(99);
        self
    }

    /// Upper bound on how long a session can stay in flight.
    pub fn max_wait(&self) -> Duration {
        self.poll_interval * self.max_attempts.saturating_sub(1)
    }

    /// Loads the config from `SIGNALSCAN_*` environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let ms: u64 = parse_number(ENV_POLL_INTERVAL_MS, &raw)?;
            config = config.poll_interval(Duration::from_millis(ms));
        }
        if let Some(raw) = lookup(ENV_MAX_POLL_ATTEMPTS) {
            let attempts: u32 = parse_number(ENV_MAX_POLL_ATTEMPTS, &raw)?;
            if attempts == 0 {
                return Err(AppError::Config(format!(
                    "{} must be at least 1",
                    ENV_MAX_POLL_ATTEMPTS
                )));
            }
            config = config.max_attempts(attempts);
        }
        Ok(config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
