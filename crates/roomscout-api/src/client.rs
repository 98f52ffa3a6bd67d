use std::sync::{Arc, RwLock};

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::retry::{is_retryable_status, RetryConfig};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether retrying the same request could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimitExceeded => true,
            ApiError::RequestFailed { status, .. } => StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(false),
            ApiError::NetworkError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Client for the hosted backend (auth, rows and object storage)
///
/// Every request carries the project `apikey`. Authenticated calls use the
/// session token once one has been set, otherwise they fall back to the anon key.
#[derive(Clone)]
pub struct BackendClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    anon_key: String,
    session_token: Arc<RwLock<Option<String>>>,
    pub(crate) retry_config: RetryConfig,
}

impl BackendClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(ApiError::InvalidConfig("backend URL is empty".into()));
        }
        if anon_key.trim().is_empty() {
            return Err(ApiError::InvalidConfig("anon key is empty".into()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("RoomScout/0.1.0"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session_token: Arc::new(RwLock::new(None)),
            retry_config: RetryConfig::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token used for authenticated calls
    pub fn set_session_token(&self, token: Option<String>) {
        match self.session_token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn session_token(&self) -> Option<String> {
        match self.session_token.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Request builder with the project key and the current bearer token
    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self
            .session_token()
            .unwrap_or_else(|| self.anon_key.clone());

        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Map non-success statuses into `ApiError`, reading the backend's message
    pub(crate) async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        debug!("{} failed with {}: {}", what, status, message);

        match status {
            StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => {
                Err(ApiError::NotFound(what.to_string()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::AuthRequired(message)),
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimitExceeded),
            _ => Err(ApiError::RequestFailed {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

/// Pull the human readable message out of an error body
///
/// Auth, rest and storage endpoints each use a different field for it.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    if body.trim().is_empty() {
        "no response body".to_string()
    } else {
        body.trim().to_string()
    }
}
