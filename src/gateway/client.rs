//! REST implementation of the control-plane gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::{ApiSettings, ResourceKind};
use crate::error::{GatewayError, HalldyllError, Result};

use super::types::{
    ApiResponse, CreateDeploymentRequest, HttpMethod, RemoteDeployment, ResourceId,
    UpdateDeploymentRequest,
};
use super::RemoteGateway;

/// Correlation header sent with every request.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Fallback wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Control-plane REST client.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// Base URL without trailing slash.
    base_url: String,
    /// Attempts per request for retryable failures.
    max_retries: u32,
    /// Linear backoff step.
    retry_delay: Duration,
}

impl HttpGateway {
    /// Creates a gateway from API settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: &ApiSettings, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        })
    }

    /// Overrides the retry backoff step.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sends a request, retrying rate limits and network failures.
    ///
    /// A `POST` that failed in transit may already have been applied, so only
    /// rate limits are retried for it. Rate limits wait for `Retry-After`;
    /// other retries back off linearly.
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse> {
        let mut attempt: u32 = 0;

        loop {
            let err = match self.send_once(method, path, body, timeout).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= self.max_retries || !should_retry(method, &err) {
                return Err(err);
            }

            let wait = err
                .retry_delay_secs()
                .map_or(self.retry_delay * attempt, Duration::from_secs);
            debug!(
                "Retry attempt {attempt} of {} for {method} {path} in {wait:?}: {err}",
                self.max_retries
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Sends a single request and classifies the outcome.
    async fn send_once(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let request_id = Uuid::new_v4().to_string();
        trace!("{method} {url} [{request_id}] body: {body:?}");

        let mut request = self
            .client
            .request(method.into(), &url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    status: None,
                    message: format!("Request to {path} timed out: {e}"),
                }
            } else {
                GatewayError::classify(None, path, format!("Request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 {
                DEFAULT_RETRY_AFTER_SECS
            } else {
                retry_after
            };

            return Err(GatewayError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        let text = response.text().await.unwrap_or_default();

        if !(200..300).contains(&status) {
            debug!("{method} {path} [{request_id}] failed with {status}");
            return Err(GatewayError::classify(Some(status), path, text).into());
        }

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| GatewayError::InvalidResponse {
                message: format!("Failed to parse response from {path}: {e}"),
            })?
        };

        Ok(ApiResponse { status, body })
    }

    /// Sends a request and decodes the JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let response = self.send(method, path, body, None).await?;
        decode(response.body, path)
    }
}

fn should_retry(method: HttpMethod, err: &HalldyllError) -> bool {
    match err {
        HalldyllError::Gateway(GatewayError::RateLimited { .. }) => true,
        _ => method != HttpMethod::Post && err.is_retryable(),
    }
}

fn decode<T: DeserializeOwned>(body: serde_json::Value, path: &str) -> Result<T> {
    serde_json::from_value(body).map_err(|e| {
        HalldyllError::Gateway(GatewayError::InvalidResponse {
            message: format!("Unexpected response shape from {path}: {e}"),
        })
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| HalldyllError::internal(format!("Failed to encode request: {e}")))
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn create(
        &self,
        kind: ResourceKind,
        request: &CreateDeploymentRequest,
    ) -> Result<(ResourceId, RemoteDeployment)> {
        debug!("Creating {kind}: {}", request.name);
        let body = to_json(request)?;
        let remote: RemoteDeployment = self
            .send_json(HttpMethod::Post, kind.collection(), Some(&body))
            .await?;

        let id = remote.id.clone().ok_or_else(|| GatewayError::InvalidResponse {
            message: format!("Create response for {} carries no id", request.name),
        })?;

        Ok((ResourceId::new(kind, id), remote))
    }

    async fn get(&self, id: &ResourceId) -> Result<RemoteDeployment> {
        self.send_json(HttpMethod::Get, &id.path(), None).await
    }

    async fn update(
        &self,
        id: &ResourceId,
        request: &UpdateDeploymentRequest,
    ) -> Result<RemoteDeployment> {
        if !id.kind.supports_update() {
            return Err(GatewayError::Unsupported {
                operation: String::from("update"),
                kind: id.kind.to_string(),
            }
            .into());
        }

        let body = to_json(request)?;
        self.send_json(HttpMethod::Patch, &id.path(), Some(&body)).await
    }

    async fn delete(&self, id: &ResourceId, timeout_hint: Duration) -> Result<()> {
        let path = format!("{}?timeout={}s", id.path(), timeout_hint.as_secs().max(1));
        self.send(HttpMethod::Delete, &path, None, Some(timeout_hint))
            .await?;
        Ok(())
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        self.send(method, path, body.as_ref(), None).await
    }
}
