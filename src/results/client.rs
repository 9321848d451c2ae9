//! HTTP client for the public results endpoint.
//!
//! Issues `GET /api/public/results/{id}` and hands back the raw status code and
//! body text. Interpreting the response is the classifier's job; this module
//! never inspects the body.
//!
//! # Security
//!
//! - Report identifiers are redacted in logs
//! - Report bodies are never logged
//! - Raw transport errors (which may contain full URLs) are not surfaced

use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use tracing::{debug, info};
use url::Url;

use crate::config::ClientConfig;
use crate::error::AppError;
use crate::results::payload::ReportIdentifier;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all results API requests.
const CLIENT_USER_AGENT: &str = concat!("signalscan/", env!("CARGO_PKG_VERSION"));

/// Path (relative to the base URL) of the public results collection.
const RESULTS_PATH: &str = "api/public/results/";

// ─────────────────────────────────────────────────────────────────────────────
// RawStatusResponse
// ─────────────────────────────────────────────────────────────────────────────

/// Unclassified response to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatusResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text (may be empty or non-JSON).
    pub body: String,
}

impl RawStatusResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Builds a response carrying a JSON body.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PublicResultsClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the public (unauthenticated) report results endpoint.
#[derive(Clone)]
pub struct PublicResultsClient {
    /// The underlying HTTP client.
    http: reqwest::Client,
    /// Base URL the results path is joined onto.
    base_url: Url,
}

impl PublicResultsClient {
    /// Creates a client with its own HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client fails to initialize.
    pub fn new(config: &ClientConfig) -> Result<Self, AppError> {
        let http = build_http_client(config)?;
        Ok(Self::with_http_client(http, config))
    }

    /// Creates a client that shares an existing HTTP connection pool.
    pub fn with_http_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
        }
    }

    /// Builds the status URL for a report: `{base}/api/public/results/{id}`.
    ///
    /// The identifier is percent-encoded as a single path segment.
    pub fn results_url(&self, id: &ReportIdentifier) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join(RESULTS_PATH)
            .map_err(|e| AppError::Internal(format!("Failed to build results URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    /// Fetches the current status of a report.
    ///
    /// Any HTTP status (including 4xx/5xx) is returned as `Ok`; only transport
    /// failures are errors.
    ///
    /// # Errors
    ///
    /// - `AppError::ConnectionFailed` - Network error or unreadable body
    /// - `AppError::Internal` - URL could not be built
    pub async fn fetch_status(&self, id: &ReportIdentifier) -> Result<RawStatusResponse, AppError> {
        let url = self.results_url(id)?;
        let start = Instant::now();

        debug!("[RESULTS] GET /{}{} (status)", RESULTS_PATH, id.redacted());

        let response = match self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(_) => {
                info!(
                    "[RESULTS] GET /{}{} FAILED {}ms",
                    RESULTS_PATH,
                    id.redacted(),
                    start.elapsed().as_millis()
                );
                return Err(AppError::ConnectionFailed(
                    "Connection to results service failed".to_string(),
                ));
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|_| {
            AppError::ConnectionFailed("Failed to read results response body".to_string())
        })?;

        info!(
            "[RESULTS] GET /{}{} -> {} {}ms",
            RESULTS_PATH,
            id.redacted(),
            status,
            start.elapsed().as_millis()
        );

        Ok(RawStatusResponse { status, body })
    }
}

/// Builds the configured HTTP client.
fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(base_url: &str) -> PublicResultsClient {
        let config = ClientConfig::new(base_url).unwrap();
        PublicResultsClient::new(&config).unwrap()
    }

    fn id(raw: &str) -> ReportIdentifier {
        ReportIdentifier::new(raw).unwrap()
    }

    #[test]
    fn build_http_client_succeeds() {
        assert!(build_http_client(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn results_url_joins_base_and_identifier() {
        let client = create_test_client("https://scan.example.com");
        let url = client.results_url(&id("abc123")).unwrap();
        assert_eq!(url.as_str(), "https://scan.example.com/api/public/results/abc123");
    }

    #[test]
    fn results_url_keeps_base_path_prefix() {
        let client = create_test_client("https://scan.example.com/app/");
        let url = client.results_url(&id("abc123")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://scan.example.com/app/api/public/results/abc123"
        );
    }

    #[test]
    fn results_url_encodes_identifier_as_one_segment() {
        let client = create_test_client("https://scan.example.com");
        let url = client.results_url(&id("a b/c")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://scan.example.com/api/public/results/a%20b%2Fc"
        );
    }

    #[tokio::test]
    async fn fetch_status_returns_status_and_body() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/api/public/results/abc123"))
            .and(header("content-type", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "pending" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = client.fetch_status(&id("abc123")).await.unwrap();

        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn fetch_status_passes_error_statuses_through() {
        let mock_server = MockServer::start().await;
        let client = create_test_client(&mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/api/public/results/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let response = client.fetch_status(&id("missing")).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn fetch_status_maps_transport_failure_to_connection_failed() {
        // Nothing listens on port 9 (discard) on test machines.
        let client = create_test_client("http://127.0.0.1:9");

        let result = client.fetch_status(&id("abc123")).await;

        match result {
            Err(AppError::ConnectionFailed(msg)) => {
                assert!(!msg.contains("127.0.0.1"), "error must not leak the URL");
            }
            other => panic!("Expected ConnectionFailed, got {:?}", other),
        }
    }
}
