//! Authenticated HTTP client for the admin API
//!
//! Wraps reqwest::Client with token headers, a request-scoped timeout and
//! uniform error classification into [`ApiError`].

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::ApiError;
use crate::config::Config;

/// Legacy header some backend versions still read the token from.
const LEGACY_TOKEN_HEADER: &str = "X-Admin-Token";

/// Query parameters; `None` and empty values are dropped from the URL.
pub type Query<'a> = [(&'a str, Option<String>)];

/// Per-request knobs.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    /// Caller-side cancellation, raced against the timeout.
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Stateless request helper; the token is passed per call.
#[derive(Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AdminClient {
    /// Build a client from resolved configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            timeout: config.timeout(),
        })
    }

    /// Client with an explicit origin and timeout (no floor applied).
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Resolve `path` against the origin and append the non-empty query values.
    pub fn build_url(&self, path: &str, query: &Query<'_>) -> Result<Url, ApiError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Network(format!("Invalid API base URL: {}", e)))?;
        let mut url = base
            .join(path)
            .map_err(|e| ApiError::Network(format!("Invalid request path {}: {}", path, e)))?;

        let present: Vec<(&str, &str)> = query
            .iter()
            .filter_map(|(key, value)| match value.as_deref() {
                Some(v) if !v.is_empty() => Some((*key, v)),
                _ => None,
            })
            .collect();
        if !present.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in present {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Issue one request and decode the JSON response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &Query<'_>,
        options: RequestOptions,
        requires_auth: bool,
    ) -> Result<T, ApiError> {
        let token = token.trim();
        if requires_auth && token.is_empty() {
            return Err(ApiError::Unauthorized);
        }

        let url = self.build_url(path, query)?;
        tracing::debug!("{} {}", options.method, url);

        let mut headers = options.headers;
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut req = self.http.request(options.method, url).headers(headers);
        if requires_auth {
            req = req.bearer_auth(token).header(LEGACY_TOKEN_HEADER, token);
        }
        if let Some(body) = options.body {
            req = req.body(body.to_string());
        }

        let timeout_ms = self.timeout_ms();
        let exchange = tokio::time::timeout(self.timeout, async move {
            let resp = req.send().await.map_err(|e| classify(e, timeout_ms))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(error_from_response(resp).await);
            }
            let bytes = resp.bytes().await.map_err(|e| classify(e, timeout_ms))?;
            serde_json::from_slice::<T>(&bytes)
                .map_err(|e| ApiError::Network(format!("Failed to parse response: {}", e)))
        });

        let outcome = match options.cancel {
            Some(cancel) => tokio::select! {
                res = exchange => res,
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            },
            None => exchange.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(ApiError::Timeout(timeout_ms)),
        }
    }

    /// Authenticated GET, retried once on a transient failure.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &Query<'_>,
    ) -> Result<T, ApiError> {
        self.get_with(path, token, query, RequestOptions::default())
            .await
    }

    /// [`get`](Self::get) with caller options such as a cancellation token.
    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &Query<'_>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        match self.request(path, token, query, options.clone(), true).await {
            Err(e) if e.is_transient() => {
                tracing::debug!("GET {} failed ({}), retrying once", path, e);
                self.request(path, token, query, options, true).await
            }
            other => other,
        }
    }

    /// Authenticated request with a JSON body (never retried).
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        self.request(path, token, &[], RequestOptions::new(method).json(body), true)
            .await
    }

    /// Authenticated DELETE.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        self.request(path, token, &[], RequestOptions::new(Method::DELETE), true)
            .await
    }
}

/// Map a transport error into the taxonomy.
fn classify(err: reqwest::Error, timeout_ms: u64) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(timeout_ms);
    }
    ApiError::Network(format!("{:#}", anyhow::Error::new(err)))
}

/// Build an [`ApiError`] from a non-success response.
async fn error_from_response(resp: reqwest::Response) -> ApiError {
    let status = resp.status().as_u16();
    let is_json = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);

    if status == 401 {
        return ApiError::Unauthorized;
    }

    let message = match resp.text().await {
        Ok(body) => extract_error_message(&body, is_json),
        Err(_) => None,
    }
    .unwrap_or_else(|| format!("Request failed with status {}", status));

    ApiError::Http { status, message }
}

/// Human-readable message from an error body: JSON `error`/`message`, else the text itself.
fn extract_error_message(body: &str, is_json: bool) -> Option<String> {
    if is_json {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        return ["error", "message"].iter().find_map(|field| {
            value
                .get(*field)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        });
    }
    let text = body.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Build a query value from anything printable.
pub fn param(value: impl ToString) -> Option<String> {
    Some(value.to_string())
}
