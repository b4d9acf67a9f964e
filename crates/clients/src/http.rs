//! Rate-limited JSON transport shared by every client in this crate.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, Result};

type GovernorLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Seconds assumed when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Clone)]
pub(crate) struct HttpTransport {
    base_url: String,
    http: Client,
    limiter: Arc<GovernorLimiter>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub(crate) fn new(
        base_url: &str,
        requests_per_minute: NonZeroU32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::configuration("base URL is empty"));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http,
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute))),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        self.http.get(url)
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);
        self.http.post(url)
    }

    /// Waits for the rate limiter, sends, and decodes a JSON body.
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send_optional(request)
            .await?
            .ok_or_else(|| ClientError::Decode("empty response body".to_string()))
    }

    /// Like [`send`](Self::send), but 204 and 404 map to `Ok(None)`.
    pub(crate) async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>> {
        self.limiter.until_ready().await;

        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        match handle_response(response).await {
            Err(e) if e.is_not_found() => Ok(None),
            other => other,
        }
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ClientError::rate_limit(retry_after));
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ClientError::api(status.as_u16(), text));
    }

    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let bytes = response.bytes().await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}
