//! HTTP implementation of the fetch executor.
//!
//! `ApiClient` joins a `RequestSpec` onto the configured base URL, attaches
//! the bearer token from `AuthState` when present, and maps every response to
//! a JSON value or an `ApiError`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::AuthState;

use super::{ApiError, FetchExecutor, FileUpload, RequestSpec};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 500;

/// API client for the health-tracking backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    auth: AuthState,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client for an absolute base URL such as
    /// `https://health.example.com/api`.
    pub fn new(base_url: &str, auth: AuthState, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ApiError::InvalidRequest(format!("Invalid API base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "API base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            auth,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay (doubles on each retry).
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Resolve the request path and query against the base URL.
    pub fn build_url(&self, request: &RequestSpec) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ApiError::InvalidRequest(format!("API base URL '{}' cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty();
            for segment in &request.segments {
                segments.push(segment);
            }
        }
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Authorization header, omitted entirely when no token is set.
    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.auth.token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn send_once(&self, url: &Url, request: &RequestSpec) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .client
            .request(request.method.into(), url.clone())
            .header(header::ACCEPT, "application/json")
            .headers(self.auth_headers()?);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref upload) = request.upload {
            builder = builder.multipart(Self::upload_form(upload)?);
        } else if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// A form is consumed by sending, so each attempt builds its own.
    fn upload_form(upload: &FileUpload) -> Result<multipart::Form, ApiError> {
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid content type: {}", e)))?;
        Ok(multipart::Form::new().part(upload.field.clone(), part))
    }

    /// Decode a successful body. Empty bodies (204, bare DELETE) become `null`.
    async fn read_body(response: reqwest::Response) -> Result<Value, ApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Parse(format!("Failed to parse JSON response: {}", e)))
    }
}

#[async_trait]
impl FetchExecutor for ApiClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn execute(&self, request: RequestSpec) -> Result<Value, ApiError> {
        let url = self.build_url(&request)?;
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            debug!(method = request.method.as_str(), url = %url, "Sending request");
            let response = self.send_once(&url, &request).await?;
            let status = response.status();

            if status.is_success() {
                return Self::read_body(response).await;
            }

            if status.as_u16() == 429 && retries < MAX_RATE_LIMIT_RETRIES {
                retries += 1;
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            debug!(url = %url, status = status.as_u16(), "Request failed");
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, AuthState::new(), Duration::from_secs(5)).expect("valid base url")
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let err = ApiClient::new("/api", AuthState::new(), Duration::from_secs(5))
            .err()
            .expect("relative base should fail");
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn test_build_url_joins_segments() {
        let api = client("https://health.example.com/api");
        let spec = RequestSpec::get(&["records", "user", "u1", "latest"]);
        assert_eq!(
            api.build_url(&spec).expect("url").as_str(),
            "https://health.example.com/api/records/user/u1/latest"
        );

        // Trailing slash on the base does not double up.
        let api = client("https://health.example.com/api/");
        let spec = RequestSpec::get(&["users"]);
        assert_eq!(
            api.build_url(&spec).expect("url").as_str(),
            "https://health.example.com/api/users"
        );
    }

    #[test]
    fn test_build_url_encodes_segments_and_query() {
        let api = client("http://localhost:3000");
        let spec = RequestSpec::new(Method::Delete, &["system-configs", "feature/x y"]);
        assert_eq!(
            api.build_url(&spec).expect("url").as_str(),
            "http://localhost:3000/system-configs/feature%2Fx%20y"
        );

        let spec = RequestSpec::get(&["auth", "profile"]).with_query("email", "a+b@example.com");
        assert_eq!(
            api.build_url(&spec).expect("url").as_str(),
            "http://localhost:3000/auth/profile?email=a%2Bb%40example.com"
        );
    }

    #[test]
    fn test_auth_headers_follow_auth_state() {
        let api = client("http://localhost:3000");
        assert!(api.auth_headers().expect("headers").is_empty());

        api.auth().set_token("secret");
        let headers = api.auth_headers().expect("headers");
        assert_eq!(
            headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer secret")
        );
    }
}
