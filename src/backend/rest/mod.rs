/// HTTPS clients for the Google Cloud REST APIs
mod cloud_tasks;
mod parameter_manager;
mod secret_manager;

pub use cloud_tasks::RestTasksBackend;
pub use parameter_manager::RestParameterBackend;
pub use secret_manager::RestSecretBackend;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{BackendCode, BackendError, BackendResult};
use crate::token::TokenProvider;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings shared by the REST backends
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    /// Idle connections kept per host; 0 disables reuse
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pool_max_idle_per_host: 10,
        }
    }
}

impl HttpOptions {
    pub fn build_client(&self) -> BackendResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .map_err(BackendError::from)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Classification by HTTP status when the body carries no status string
pub fn code_for_http_status(status: StatusCode) -> BackendCode {
    match status.as_u16() {
        400 => BackendCode::InvalidArgument,
        401 => BackendCode::Unauthenticated,
        403 => BackendCode::PermissionDenied,
        404 => BackendCode::NotFound,
        409 => BackendCode::AlreadyExists,
        412 => BackendCode::FailedPrecondition,
        429 => BackendCode::TooManyRequests,
        499 => BackendCode::Cancelled,
        500 => BackendCode::Internal,
        501 => BackendCode::Unimplemented,
        503 => BackendCode::Unavailable,
        504 => BackendCode::DeadlineExceeded,
        _ => BackendCode::Unknown,
    }
}

/// Turn an error response into a [`BackendError`]
pub fn classify_error(status: StatusCode, body: &str) -> BackendError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope
                .error
                .status
                .as_deref()
                .and_then(BackendCode::from_status)
                .unwrap_or_else(|| code_for_http_status(status));
            let message = if envelope.error.message.is_empty() {
                status.to_string()
            } else {
                envelope.error.message
            };
            BackendError::new(code, message)
        }
        Err(_) => BackendError::new(
            code_for_http_status(status),
            format!("{} {}", status, body.trim()),
        ),
    }
}

pub(crate) fn encode_payload(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub(crate) fn decode_payload(data: Option<&str>) -> BackendResult<Vec<u8>> {
    match data {
        Some(encoded) => STANDARD
            .decode(encoded)
            .map_err(|e| BackendError::new(BackendCode::DataLoss, format!("base64 decode failed: {}", e))),
        None => Ok(Vec::new()),
    }
}

/// RFC 3339 timestamp, tolerating absence
pub(crate) fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Authenticated JSON-over-HTTPS caller
pub struct RestClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    endpoint: String,
}

impl RestClient {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenProvider>, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            tokens,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, encode_path(path))
    }

    /// Issue one call and decode the JSON reply
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> BackendResult<T> {
        let text = self.call_raw(method, path, query, body).await?;
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            BackendError::new(
                BackendCode::Internal,
                format!("Failed to decode response from {}: {}", path, e),
            )
        })
    }

    /// Issue one call whose reply body is ignored
    pub async fn call_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> BackendResult<()> {
        self.call_raw(method, path, &[], body).await.map(|_| ())
    }

    async fn call_raw(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> BackendResult<String> {
        let url = self.url(path);
        let token = self.tokens.token().await?;

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(method = %method, url = %url, "Backend request");
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status, &text));
        }
        Ok(text)
    }
}

/// Query pairs for list RPCs
/// Percent-encode each path segment, keeping a trailing `:verb` custom method
fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| match segment.rsplit_once(':') {
            Some((id, verb)) if !verb.is_empty() && verb.chars().all(|c| c.is_ascii_alphabetic()) => {
                format!("{}:{}", urlencoding::encode(id), verb)
            }
            _ => urlencoding::encode(segment).into_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn page_query(page_size: u32, page_token: Option<String>) -> Vec<(&'static str, String)> {
    let mut query = vec![("pageSize", page_size.to_string())];
    if let Some(token) = page_token.filter(|t| !t.is_empty()) {
        query.push(("pageToken", token));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_status_string() {
        let body = r#"{"error": {"code": 400, "message": "Secret Version [x] is in DISABLED state.", "status": "FAILED_PRECONDITION"}}"#;
        let err = classify_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code, BackendCode::FailedPrecondition);
        assert!(err.message.contains("DISABLED"));
    }

    #[test]
    fn test_classify_falls_back_to_http_status() {
        let err = classify_error(StatusCode::NOT_FOUND, "<html>gone</html>");
        assert_eq!(err.code, BackendCode::NotFound);

        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, r#"{"error": {"message": "slow"}}"#);
        assert_eq!(err.code, BackendCode::TooManyRequests);
        assert_eq!(err.message, "slow");

        let err = classify_error(StatusCode::IM_A_TEAPOT, "");
        assert_eq!(err.code, BackendCode::Unknown);
    }

    #[test]
    fn test_payload_codec() {
        let encoded = encode_payload(b"p@ss1");
        assert_eq!(decode_payload(Some(&encoded)).unwrap(), b"p@ss1");
        assert!(decode_payload(Some("***")).is_err());
        assert!(decode_payload(None).unwrap().is_empty());
    }

    #[test]
    fn test_encode_path_keeps_custom_methods() {
        assert_eq!(
            encode_path("/projects/p/secrets/db pass/versions/latest:access"),
            "projects/p/secrets/db%20pass/versions/latest:access"
        );
        assert_eq!(encode_path("projects/p/queues/q/tasks/t:run"), "projects/p/queues/q/tasks/t:run");
    }

    #[test]
    fn test_page_query() {
        assert_eq!(page_query(10, None).len(), 1);
        assert_eq!(page_query(10, Some(String::new())).len(), 1);
        assert_eq!(page_query(10, Some("abc".into()))[1].1, "abc");
    }

    #[test]
    fn test_url_joining() {
        let client = RestClient::new(
            reqwest::Client::new(),
            Arc::new(TokenProvider::fixed("t")),
            "https://secretmanager.googleapis.com/v1/",
        );
        assert_eq!(
            client.url("/projects/p/secrets"),
            "https://secretmanager.googleapis.com/v1/projects/p/secrets"
        );
    }
}
