//! # Portcullis Client
//!
//! JSON/HTTP client for the user and auth backend.
//!
//! Every call is bounded by the caller's [`RequestContext`] deadline when it is
//! shorter than the client timeout. A response outside 2xx becomes a
//! [`HttpClientError`] carrying the downstream status and body; the body is
//! kept for logs and never shown to clients.
//!
//! ## Example
//!
//! ```no_run
//! use portcullis_client::ApiClient;
//! use portcullis_core::RequestContext;
//! use serde_json::{json, Value};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), portcullis_core::GatewayError> {
//! let client = ApiClient::builder("http://users.internal:8000")
//!     .timeout(Duration::from_secs(10))
//!     .default_header("x-client", "portcullis")
//!     .build()?;
//!
//! let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
//! let created: Value = client.post(&ctx, "/user", &json!({"email": "a@b.c"}), &[]).await?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use portcullis_core::{GatewayError, GatewayResult, HttpClientError, RequestContext};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Message carried by every non-success downstream response.
pub const CLIENT_ERROR_MESSAGE: &str = "client error response";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON/HTTP client bound to one base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    default_headers: Vec<(String, String)>,
    timeout: Duration,
}

impl ApiClient {
    /// Starts building a client for `base_url`.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            default_headers: Vec::new(),
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the client timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performs a GET request.
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        headers: &[(&str, &str)],
    ) -> GatewayResult<T> {
        self.send::<(), T>(ctx, Method::GET, path, None, headers)
            .await
    }

    /// Performs a POST request with a JSON body.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> GatewayResult<T> {
        self.send(ctx, Method::POST, path, Some(body), headers)
            .await
    }

    /// Performs a PUT request with a JSON body.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> GatewayResult<T> {
        self.send(ctx, Method::PUT, path, Some(body), headers).await
    }

    /// Performs a DELETE request.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        headers: &[(&str, &str)],
    ) -> GatewayResult<T> {
        self.send::<(), T>(ctx, Method::DELETE, path, None, headers)
            .await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: &[(&str, &str)],
    ) -> GatewayResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let timeout = ctx.bounded(self.timeout);
        if timeout.is_zero() {
            return Err(GatewayError::internal_with_status(
                "upstream service timed out",
                StatusCode::GATEWAY_TIMEOUT,
                std::io::Error::new(std::io::ErrorKind::TimedOut, "request deadline exceeded"),
            ));
        }

        let mut request = self
            .client
            .request(method.clone(), &url)
            .timeout(timeout)
            .headers(self.merge_headers(headers));
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|e| {
                GatewayError::internal_with_source("failed to marshal request body", e)
            })?;
            request = request
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(bytes);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(
                trace_id = %ctx.trace_id(),
                method = %method,
                url = %url,
                error = %e,
                "downstream request failed"
            );
            transport_error(e)
        })?;

        let status = response.status();
        tracing::debug!(
            trace_id = %ctx.trace_id(),
            method = %method,
            url = %url,
            status = status.as_u16(),
            "downstream response"
        );

        if !status.is_success() {
            let err = match response.text().await {
                Ok(body) => HttpClientError::new(status, CLIENT_ERROR_MESSAGE, Some(body)),
                Err(_) => HttpClientError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to read client response body",
                    None,
                ),
            };
            return Err(err.into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::internal_with_source("failed to read response body", e))?;
        decode(&bytes)
    }
}

impl ApiClient {
    fn merge_headers(&self, headers: &[(&str, &str)]) -> HeaderMap {
        let defaults = self
            .default_headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()));
        let mut merged = HeaderMap::new();
        for (name, value) in defaults.chain(headers.iter().copied()) {
            match (
                HeaderName::try_from(name),
                HeaderValue::try_from(value),
            ) {
                (Ok(name), Ok(value)) => {
                    merged.insert(name, value);
                }
                _ => tracing::warn!(header = name, "skipping invalid request header"),
            }
        }
        merged
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> GatewayResult<T> {
    let bytes = if bytes.is_empty() { b"null".as_slice() } else { bytes };
    serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::internal_with_source("failed to decode response body", e))
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    let (message, status) = if err.is_timeout() {
        ("upstream service timed out", StatusCode::GATEWAY_TIMEOUT)
    } else {
        ("upstream service unavailable", StatusCode::BAD_GATEWAY)
    };
    GatewayError::internal_with_status(message, status, err)
}

/// Builder for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
}

impl ApiClientBuilder {
    /// Sets the per-call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request. Per-call headers override it.
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Adds several default headers.
    #[must_use]
    pub fn default_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.default_headers.push((name.into(), value.into()));
        }
        self
    }

    /// Builds the client.
    pub fn build(self) -> GatewayResult<ApiClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::internal_with_source("failed to create HTTP client", e))?;

        Ok(ApiClient {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            default_headers: self.default_headers,
            timeout: self.timeout,
        })
    }
}
