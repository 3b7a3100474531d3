//! # API Client
//!
//! Thin wrapper over HTTP that adds the API-version and key headers and
//! cooperates with the server's throttling signals.
//!
//! ## Request Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ApiClient::request()                                 │
//! │                                                                         │
//! │  attempt = 1                                                           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  transport.execute() ── Err ──► SyncError::Transport/Timeout (fatal)   │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Backoff: N > 0 ? ──► sleep N seconds (even on success)                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  429 and attempt < max ? ──► sleep Retry-After (default 60s),          │
//! │     │                        attempt += 1, loop                        │
//! │     ▼                                                                   │
//! │  return response (any status, including a final 429)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Status interpretation is left to the caller; [`ApiClient::get`] is the
//! helper that turns non-2xx into [`SyncError::Api`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{SyncError, SyncResult};

/// Header carrying the API version.
pub const VERSION_HEADER: &str = "Zotero-API-Version";

/// Header carrying the per-library API key.
pub const KEY_HEADER: &str = "Zotero-API-Key";

// =============================================================================
// Raw Request / Response
// =============================================================================

/// A fully built request handed to the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

/// A response as received, before any status interpretation.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        ApiResponse {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Seconds from the `Backoff` header, if positive.
    pub fn backoff(&self) -> Option<Duration> {
        parse_seconds(self.header("backoff")?).filter(|wait| !wait.is_zero())
    }

    /// Seconds from the `Retry-After` header, if present and numeric.
    /// Zero means retry immediately.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_seconds(self.header("retry-after")?)
    }

    /// The `Last-Modified-Version` header.
    pub fn last_modified_version(&self) -> Option<i64> {
        self.header("last-modified-version")?.trim().parse().ok()
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> SyncResult<T> {
        serde_json::from_slice(&self.body).map_err(|_| SyncError::malformed(context, &self.body))
    }

    /// The body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Longest wait honored from a server header.
pub const MAX_SERVER_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Non-negative seconds, clamped to [`MAX_SERVER_WAIT`].
fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let wait = Duration::try_from_secs_f64(secs).unwrap_or(MAX_SERVER_WAIT);
    Some(wait.min(MAX_SERVER_WAIT))
}

// =============================================================================
// Transport Seam
// =============================================================================

/// Sends one request and returns whatever came back.
///
/// Implementations must report connect/DNS/timeout failures as errors and
/// every HTTP status (including 4xx/5xx) as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> SyncResult<ApiResponse>;
}

/// Production transport over reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bibmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Ok(ReqwestTransport { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout.as_secs())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> SyncResult<ApiResponse> {
        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(ApiResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

// =============================================================================
// API Client
// =============================================================================

/// Client for the remote bibliography API.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_version: String,
    max_attempts: u32,
    default_retry_after: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl ApiClient {
    /// Creates a client over the reqwest transport.
    pub fn from_settings(settings: &ApiSettings) -> SyncResult<Self> {
        let transport = ReqwestTransport::new(settings.timeout())?;
        Self::new(settings, Arc::new(transport))
    }

    /// Creates a client over any transport.
    pub fn new(settings: &ApiSettings, transport: Arc<dyn HttpTransport>) -> SyncResult<Self> {
        Url::parse(&settings.base_url)?;

        Ok(ApiClient {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_version: settings.api_version.clone(),
            max_attempts: settings.max_attempts.max(1),
            default_retry_after: Duration::from_secs(settings.default_retry_after_secs),
        })
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> SyncResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Sends a request, honoring `Backoff` and retrying 429s.
    ///
    /// Returns the final response whatever its status. Only transport
    /// failures are errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        api_key: &str,
        query: &[(&str, String)],
    ) -> SyncResult<ApiResponse> {
        let request = ApiRequest {
            method,
            url: self.build_url(path, query)?,
            headers: vec![
                (VERSION_HEADER.to_string(), self.api_version.clone()),
                (KEY_HEADER.to_string(), api_key.to_string()),
            ],
        };

        let mut attempt: u32 = 1;
        loop {
            debug!(
                method = %request.method,
                url = %request.url,
                attempt,
                "API request"
            );

            let response = self.transport.execute(request.clone()).await?;

            if let Some(backoff) = response.backoff() {
                warn!(seconds = backoff.as_secs_f64(), "Server requested backoff");
                tokio::time::sleep(backoff).await;
            }

            if response.status == 429 && attempt < self.max_attempts {
                let wait = response.retry_after().unwrap_or(self.default_retry_after);
                warn!(
                    url = %request.url,
                    attempt,
                    seconds = wait.as_secs_f64(),
                    "Rate limited, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            return Ok(response);
        }
    }

    /// GET that fails with [`SyncError::Api`] on a non-2xx status.
    pub async fn get(&self, path: &str, api_key: &str, query: &[(&str, String)]) -> SyncResult<ApiResponse> {
        let response = self.request(Method::GET, path, api_key, query).await?;
        if !response.is_success() {
            return Err(SyncError::Api {
                path: path.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// GET and decode JSON, returning the body and `Last-Modified-Version`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        api_key: &str,
        query: &[(&str, String)],
    ) -> SyncResult<(T, Option<i64>)> {
        let response = self.get(path, api_key, query).await?;
        let value = response.json(path)?;
        Ok((value, response.last_modified_version()))
    }

    /// GET and return the body as text.
    pub async fn get_text(&self, path: &str, api_key: &str, query: &[(&str, String)]) -> SyncResult<String> {
        Ok(self.get(path, api_key, query).await?.text())
    }

    /// Fetches an attachment's file for on-demand streaming to a caller.
    /// Nothing is stored locally.
    pub async fn download_attachment(
        &self,
        library_path: &str,
        attachment_key: &str,
        api_key: &str,
    ) -> SyncResult<ApiResponse> {
        let path = format!("{library_path}/items/{attachment_key}/file");
        self.get(&path, api_key, &[]).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use tokio::time::Instant;

    fn client(transport: Arc<ScriptedTransport>) -> ApiClient {
        ApiClient::new(&ApiSettings::default(), transport).unwrap()
    }

    fn rate_limited(secs: &str) -> SyncResult<ApiResponse> {
        Ok(ApiResponse::new(429, "").with_header("Retry-After", secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limit_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            rate_limited("1"),
            rate_limited("1"),
            Ok(ApiResponse::new(200, "[]")),
        ]));
        let client = client(transport.clone());

        let start = Instant::now();
        let response = client.request(Method::GET, "/groups/1/items", "k", &[]).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.request_count(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_429() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            rate_limited("1"),
            rate_limited("1"),
            rate_limited("1"),
            Ok(ApiResponse::new(200, "")),
        ]));
        let client = client(transport.clone());

        let start = Instant::now();
        let response = client.request(Method::GET, "/users/1/items", "k", &[]).await.unwrap();

        assert_eq!(response.status, 429);
        assert_eq!(transport.request_count(), 3);
        // No sleep after the final attempt.
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_retry_after_uses_default() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(ApiResponse::new(429, "")),
            Ok(ApiResponse::new(200, "")),
        ]));
        let client = client(transport);

        let start = Instant::now();
        client.request(Method::GET, "/users/1/items", "k", &[]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_even_on_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(
            ApiResponse::new(200, "{}").with_header("Backoff", "5")
        )]));
        let client = client(transport);

        let start = Instant::now();
        let response = client.request(Method::GET, "/users/1/items", "k", &[]).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(SyncError::Transport("connection refused".into())),
            Ok(ApiResponse::new(200, "")),
        ]));
        let client = client(transport.clone());

        let err = client.request(Method::GET, "/users/1/items", "k", &[]).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_other_statuses_returned_as_is() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(ApiResponse::new(500, "oops"))]));
        let client = client(transport);

        let response = client.request(Method::GET, "/users/1/items", "k", &[]).await.unwrap();
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn test_headers_and_query() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(ApiResponse::new(200, "[]"))]));
        let client = client(transport.clone());

        client
            .request(
                Method::GET,
                "/groups/7/items/top",
                "secret",
                &[("start", "0".to_string()), ("since", "12".to_string())],
            )
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(
            request.url.as_str(),
            "https://api.zotero.org/groups/7/items/top?start=0&since=12"
        );
        assert!(request
            .headers
            .contains(&(VERSION_HEADER.to_string(), "3".to_string())));
        assert!(request
            .headers
            .contains(&(KEY_HEADER.to_string(), "secret".to_string())));
    }

    #[tokio::test]
    async fn test_get_json_errors() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(ApiResponse::new(403, "Forbidden")),
            Ok(ApiResponse::new(200, "<html>not json</html>")),
            Ok(ApiResponse::new(200, "[1, 2]").with_header("Last-Modified-Version", "88")),
        ]));
        let client = client(transport);

        let err = client
            .get_json::<Vec<i64>>("/groups/1/collections", "k", &[])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));

        let err = client
            .get_json::<Vec<i64>>("/groups/1/collections", "k", &[])
            .await
            .unwrap_err();
        match err {
            SyncError::MalformedPayload { context, preview } => {
                assert_eq!(context, "/groups/1/collections");
                assert!(preview.contains("not json"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let (value, version) = client
            .get_json::<Vec<i64>>("/groups/1/collections", "k", &[])
            .await
            .unwrap();
        assert_eq!(value, vec![1, 2]);
        assert_eq!(version, Some(88));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retry_after_retries_immediately() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            rate_limited("0"),
            Ok(ApiResponse::new(200, "")),
        ]));
        let client = client(transport.clone());

        let start = Instant::now();
        let response = client.request(Method::GET, "/users/1/items", "k", &[]).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.request_count(), 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_backoff_is_clamped() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(
            ApiResponse::new(200, "{}").with_header("Backoff", "1e20")
        )]));
        let client = client(transport);

        let start = Instant::now();
        let response = client.request(Method::GET, "/users/1/items", "k", &[]).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(start.elapsed() >= MAX_SERVER_WAIT);
        assert!(start.elapsed() < MAX_SERVER_WAIT + Duration::from_secs(1));
    }

    #[test]
    fn test_wait_header_bounds() {
        let response = ApiResponse::new(429, "")
            .with_header("Backoff", "1e400")
            .with_header("Retry-After", "1e20");
        // 1e400 overflows to infinity and is ignored.
        assert_eq!(response.backoff(), None);
        assert_eq!(response.retry_after(), Some(MAX_SERVER_WAIT));

        let response = ApiResponse::new(429, "")
            .with_header("Backoff", "-5")
            .with_header("Retry-After", "0");
        assert_eq!(response.backoff(), None);
        assert_eq!(response.retry_after(), Some(Duration::ZERO));

        let response = ApiResponse::new(200, "").with_header("Backoff", "NaN");
        assert_eq!(response.backoff(), None);
    }

    #[tokio::test]
    async fn test_download_attachment() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(ApiResponse::new(200, vec![0x25, 0x50, 0x44, 0x46]).with_header("Content-Type", "application/pdf")),
            Ok(ApiResponse::new(404, "Not found")),
        ]));
        let client = client(transport.clone());

        let file = client
            .download_attachment("/groups/7", "ATT12345", "secret")
            .await
            .unwrap();
        assert_eq!(file.body, b"%PDF".to_vec());
        assert_eq!(file.header("content-type"), Some("application/pdf"));

        let err = client
            .download_attachment("/groups/7", "GONE0000", "secret")
            .await
            .unwrap_err();
        match err {
            SyncError::Api { path, status } => {
                assert_eq!(path, "/groups/7/items/GONE0000/file");
                assert_eq!(status, 404);
            }
            other => panic!("unexpected {other:?}"),
        }

        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0].url.as_str(),
            "https://api.zotero.org/groups/7/items/ATT12345/file"
        );
        assert!(requests[0]
            .headers
            .contains(&(KEY_HEADER.to_string(), "secret".to_string())));
    }

    #[test]
    fn test_header_parsing() {
        let response = ApiResponse::new(200, "")
            .with_header("Backoff", "0")
            .with_header("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(response.backoff(), None);
        assert_eq!(response.retry_after(), None);
        assert_eq!(response.header("BACKOFF"), Some("0"));
    }
}
