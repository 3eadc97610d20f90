//! Geocode Provider HTTP Client
//!
//! Issues the directory requests and classifies every failure. The client
//! never surfaces an error: timeouts, rate limits, non-2xx answers and
//! undecodable bodies are logged and become an empty record list, so the UI
//! degrades to "no matches".

use crate::config::GeocodeConfig;
use crate::domain::ports::GeocodeDirectory;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Top-level field holding the record list
pub const RECORDS_FIELD: &str = "geonames";

/// Provider status values that mean a credit limit was hit
const LIMIT_STATUS_VALUES: &[u64] = &[18, 19, 20];

// =============================================================================
// Counters
// =============================================================================

/// Outcome counters for provider requests
#[derive(Debug, Default)]
pub struct GeocodeCounters {
    pub requests: AtomicU64,
    pub successes: AtomicU64,
    pub timeouts: AtomicU64,
    pub rate_limited: AtomicU64,
    pub http_errors: AtomicU64,
    pub network_errors: AtomicU64,
    pub decode_errors: AtomicU64,
}

impl GeocodeCounters {
    fn record_failure(&self, err: &Error) {
        let counter = match err {
            Error::UpstreamTimeout { .. } => &self.timeouts,
            Error::UpstreamRateLimited { .. } => &self.rate_limited,
            Error::UpstreamStatus { .. } => &self.http_errors,
            Error::UpstreamNetwork(_) => &self.network_errors,
            _ => &self.decode_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GeocodeCountersSnapshot {
        GeocodeCountersSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            http_errors: self.http_errors.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeocodeCountersSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub timeouts: u64,
    pub rate_limited: u64,
    pub http_errors: u64,
    pub network_errors: u64,
    pub decode_errors: u64,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP adapter for the geocode directory
pub struct GeocodeClient {
    http: reqwest::Client,
    timeout: Duration,
    counters: Arc<GeocodeCounters>,
}

impl GeocodeClient {
    /// Create a client using the configured timeout
    pub fn new(config: &GeocodeConfig) -> Result<Self> {
        Self::with_timeout(config.timeout())
    }

    /// Create a client with an explicit timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build geocode HTTP client: {}", e)))?;

        Ok(Self {
            http,
            timeout,
            counters: Arc::new(GeocodeCounters::default()),
        })
    }

    /// Shared outcome counters
    pub fn counters(&self) -> Arc<GeocodeCounters> {
        self.counters.clone()
    }

    /// Fetch and classify, surfacing the failure
    pub async fn try_fetch(&self, url: &str) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify_transport(url, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::UpstreamRateLimited { url: url.to_string() });
        }
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.classify_transport(url, e))?;

        extract_records(url, body)
    }

    fn classify_transport(&self, url: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::UpstreamTimeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else if err.is_decode() {
            Error::UpstreamDecode(err.to_string())
        } else {
            Error::UpstreamNetwork(err)
        }
    }
}

#[async_trait]
impl GeocodeDirectory for GeocodeClient {
    async fn fetch(&self, url: &str) -> Vec<Value> {
        info!(url, "Requesting geocode provider");
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        match self.try_fetch(url).await {
            Ok(records) => {
                debug!(url, records = records.len(), "Geocode provider answered");
                self.counters.successes.fetch_add(1, Ordering::Relaxed);
                records
            }
            Err(e) => {
                self.counters.record_failure(&e);
                match &e {
                    Error::UpstreamRateLimited { .. } => {
                        warn!(url, "Geocode provider rate limit exceeded")
                    }
                    _ => error!(
                        url,
                        error = %e,
                        transient = e.is_transient(),
                        "Geocode provider request failed"
                    ),
                }
                Vec::new()
            }
        }
    }
}

/// Pull the record list out of a 2xx body
///
/// The provider reports credit exhaustion inside a 200 body as a `status`
/// object instead of a list.
fn extract_records(url: &str, body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Object(mut map) => {
            if let Some(Value::Array(records)) = map.remove(RECORDS_FIELD) {
                return Ok(records);
            }

            if let Some(status) = map.get("status") {
                let value = status.get("value").and_then(Value::as_u64);
                let message = status
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown provider status");

                if value.is_some_and(|v| LIMIT_STATUS_VALUES.contains(&v)) {
                    return Err(Error::UpstreamRateLimited { url: url.to_string() });
                }
                return Err(Error::UpstreamDecode(format!("provider status: {}", message)));
            }

            Err(Error::UpstreamDecode(format!(
                "response has no '{}' list",
                RECORDS_FIELD
            )))
        }
        _ => Err(Error::UpstreamDecode("response is not a JSON object".into())),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::{http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::json;

    async fn spawn_provider() -> String {
        let router = Router::new()
            .route(
                "/ok",
                get(|| async {
                    Json(json!({"geonames": [
                        {"geonameId": 3686110, "countryName": "Colombia", "countryCode": "CO"}
                    ]}))
                }),
            )
            .route("/limited", get(|| async { AxumStatus::TOO_MANY_REQUESTS }))
            .route("/broken", get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }))
            .route("/forbidden", get(|| async { AxumStatus::FORBIDDEN }))
            .route(
                "/credits",
                get(|| async {
                    Json(json!({"status": {"message": "hourly limit exceeded", "value": 19}}))
                }),
            )
            .route(
                "/unknown-user",
                get(|| async {
                    Json(json!({"status": {"message": "user does not exist.", "value": 10}}))
                }),
            )
            .route("/garbage", get(|| async { "<html>oops</html>" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!({"geonames": []}))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> GeocodeClient {
        GeocodeClient::with_timeout(Duration::from_millis(300)).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_records() {
        let base = spawn_provider().await;
        let client = client();

        let records = client.fetch(&format!("{}/ok", base)).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["countryCode"], "CO");

        let counters = client.counters().snapshot();
        assert_eq!(counters.requests, 1);
        assert_eq!(counters.successes, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_empty_not_error() {
        let base = spawn_provider().await;
        let client = client();

        assert_matches!(
            client.try_fetch(&format!("{}/limited", base)).await,
            Err(Error::UpstreamRateLimited { .. })
        );
        assert!(client.fetch(&format!("{}/limited", base)).await.is_empty());
        assert_eq!(client.counters().snapshot().rate_limited, 1);
    }

    #[tokio::test]
    async fn test_provider_credit_status_counts_as_rate_limit() {
        let base = spawn_provider().await;
        let client = client();

        assert!(client.fetch(&format!("{}/credits", base)).await.is_empty());
        assert_eq!(client.counters().snapshot().rate_limited, 1);

        assert_matches!(
            client.try_fetch(&format!("{}/unknown-user", base)).await,
            Err(Error::UpstreamDecode(_))
        );
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let base = spawn_provider().await;
        let client = client();

        assert_matches!(
            client.try_fetch(&format!("{}/broken", base)).await,
            Err(Error::UpstreamStatus { status: 500, .. })
        );
        assert_matches!(
            client.try_fetch(&format!("{}/forbidden", base)).await,
            Err(Error::UpstreamStatus { status: 403, .. })
        );
        assert!(client.fetch(&format!("{}/broken", base)).await.is_empty());
        assert_eq!(client.counters().snapshot().http_errors, 1);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_empty() {
        let base = spawn_provider().await;
        let client = client();

        assert!(client.fetch(&format!("{}/garbage", base)).await.is_empty());
        assert_eq!(client.counters().snapshot().decode_errors, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_empty() {
        let base = spawn_provider().await;
        let client = client();

        assert_matches!(
            client.try_fetch(&format!("{}/slow", base)).await,
            Err(Error::UpstreamTimeout { .. })
        );
        assert!(client.fetch(&format!("{}/slow", base)).await.is_empty());
        assert_eq!(client.counters().snapshot().timeouts, 1);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_empty() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client();
        assert!(client.fetch(&format!("http://{}/ok", addr)).await.is_empty());
        assert_eq!(client.counters().snapshot().network_errors, 1);
    }

    #[test]
    fn test_extract_records_requires_list() {
        assert_matches!(
            extract_records("u", json!({"geonames": "nope"})),
            Err(Error::UpstreamDecode(_))
        );
        assert_matches!(extract_records("u", json!([1, 2])), Err(Error::UpstreamDecode(_)));
        assert_eq!(extract_records("u", json!({"geonames": []})).unwrap(), Vec::<Value>::new());
    }
}
