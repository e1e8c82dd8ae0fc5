//! HTTP client for the load-test backend
//!
//! Wraps reqwest with a per-request timeout, optional request signing and
//! retry-with-backoff on transport errors.

use rand::Rng;
use reqwest::{Client, Method, Url};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::sigv4::RequestSigner;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl HttpError {
    /// Transport-level failures worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HttpError::RequestFailed(_) | HttpError::Timeout(_) | HttpError::ConnectionRefused(_)
        )
    }
}

/// HTTP client with signing and transport retries
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    signer: Option<RequestSigner>,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpClient {
    /// Create client with a per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::RequestFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            signer: None,
            timeout,
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        })
    }

    /// Sign every request with the given signer
    pub fn signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Retry transport errors up to `max_retries` times
    pub fn retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Send a request, retrying transport failures with exponential backoff
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_backoff, attempt, jitter(self.retry_backoff));
                    attempt += 1;
                    warn!(
                        "{} {} failed ({}), retry {}/{} in {}ms",
                        request.method,
                        request.url,
                        e,
                        attempt,
                        self.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = Url::parse(&request.url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", request.url)))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| HttpError::RequestFailed(format!("Invalid HTTP method {}", request.method)))?;

        debug!("Sending {} request to {}", request.method, url);

        let mut req_builder = self.client.request(method, url.clone());

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let body = request.body.clone().unwrap_or_default();
        if let Some(signer) = &self.signer {
            let signed = signer
                .sign(&request.method, &url, &request.headers, body.as_bytes())
                .await?;
            for (key, value) in signed {
                req_builder = req_builder.header(key, value);
            }
        }

        if request.body.is_some() {
            req_builder = req_builder.body(body);
        }

        let start = Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.timeout.as_secs())
            } else if e.is_connect() {
                HttpError::ConnectionRefused(url.to_string())
            } else {
                HttpError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.timeout.as_secs())
            } else {
                HttpError::Body(e.to_string())
            }
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            body,
        })
    }

    /// Convenience method for GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::get(url)).await
    }

    /// POST a JSON document
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, HttpError> {
        self.send(
            HttpRequest::post(url)
                .header("content-type", "application/json")
                .body(body.to_string()),
        )
        .await
    }
}

/// Exponential backoff: `base * 2^attempt + jitter`, capped at 30 seconds
fn backoff_delay(base: Duration, attempt: u32, jitter: Duration) -> Duration {
    let factor = 1u32 << attempt.min(10);
    base.saturating_mul(factor)
        .saturating_add(jitter)
        .min(Duration::from_secs(30))
}

fn jitter(base: Duration) -> Duration {
    let max_ms = (base.as_millis() as u64 / 2).max(1);
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// HTTP response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let req = HttpRequest::post("http://example.com/scenarios")
            .header("content-type", "application/json")
            .body("{}");

        assert_eq!(req.method, "POST");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_http_response_success() {
        let mut resp = HttpResponse {
            status_code: 200,
            body: String::new(),
        };
        assert!(resp.is_success());

        resp.status_code = 403;
        assert!(!resp.is_success());
    }

    #[test]
    fn test_transient_errors() {
        assert!(HttpError::Timeout(30).is_transient());
        assert!(HttpError::ConnectionRefused("x".into()).is_transient());
        assert!(!HttpError::InvalidUrl("x".into()).is_transient());
        assert!(!HttpError::Body("x".into()).is_transient());
        assert!(!HttpError::Signing("x".into()).is_transient());
    }

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0, Duration::ZERO), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 3, Duration::from_millis(7)), Duration::from_millis(807));
        assert_eq!(backoff_delay(base, 20, Duration::ZERO), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_bounded() {
        let base = Duration::from_millis(100);
        for _ in 0..50 {
            assert!(jitter(base) <= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_transport_errors_retried_up_to_limit() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // Accept every connection and close it before answering.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let client = HttpClient::with_timeout(Duration::from_secs(2))
            .unwrap()
            .retries(2, Duration::from_millis(1));

        let err = client
            .get(&format!("http://{addr}/scenarios/x"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retries_means_one_attempt() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let client = HttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        assert!(client.get(&format!("http://{addr}/")).await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retried() {
        let client = HttpClient::with_timeout(Duration::from_secs(1))
            .unwrap()
            .retries(5, Duration::from_secs(10));

        let err = client.get("not a url").await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl(_)));
    }
}
