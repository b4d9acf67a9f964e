//! HTTP client for the gamma-exposure service.
//!
//! `GET {base}/gex/{ticker}` returns the current call/put walls, net GEX,
//! and regime. A 404 means the service has no data for the ticker.

use std::num::NonZeroU32;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use condor_core::{GexConfig, GexData, GexProvider, GexRegime};
use nonzero_ext::nonzero;
use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::http::HttpTransport;

/// Configuration for the GEX client.
#[derive(Debug, Clone)]
pub struct GexClientConfig {
    pub base_url: String,
    pub requests_per_minute: NonZeroU32,
    pub timeout_secs: u64,
}

impl GexClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            requests_per_minute: nonzero!(60u32),
            timeout_secs: 10,
        }
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Builds a config from the application settings; `None` when GEX is disabled.
    #[must_use]
    pub fn from_settings(cfg: &GexConfig) -> Option<Self> {
        cfg.api_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Self::new(url).with_timeout_secs(cfg.timeout_secs))
    }
}

/// Wire payload. Field names vary between service versions, so aliases
/// cover the known spellings.
#[derive(Debug, Deserialize)]
struct RawGex {
    #[serde(default)]
    call_wall: Option<f64>,
    #[serde(default)]
    put_wall: Option<f64>,
    #[serde(default, alias = "gex_regime")]
    regime: Option<String>,
    #[serde(default, alias = "total_gex")]
    net_gex: Option<f64>,
    #[serde(default, alias = "flip", alias = "gamma_flip")]
    flip_point: Option<f64>,
    #[serde(default, alias = "spot")]
    spot_price: Option<f64>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl From<RawGex> for GexData {
    fn from(raw: RawGex) -> Self {
        let level = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
        let net_gex = raw.net_gex.filter(|x| x.is_finite()).unwrap_or(0.0);
        let regime = raw
            .regime
            .as_deref()
            .and_then(GexRegime::parse)
            .unwrap_or_else(|| GexRegime::from_net_gex(net_gex));

        Self {
            call_wall: level(raw.call_wall),
            put_wall: level(raw.put_wall),
            regime,
            net_gex,
            flip_point: level(raw.flip_point),
            spot_price: level(raw.spot_price),
            timestamp: raw.timestamp,
        }
    }
}

/// Rate-limited client for the GEX service.
#[derive(Debug)]
pub struct GexClient {
    transport: HttpTransport,
}

impl GexClient {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &GexClientConfig) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(
                &config.base_url,
                config.requests_per_minute,
                config.timeout_secs,
            )?,
        })
    }

    /// Fetches GEX levels for `ticker`; `Ok(None)` on 404.
    ///
    /// # Errors
    /// Returns error on any other failure.
    pub async fn fetch(&self, ticker: &str) -> Result<Option<GexData>> {
        if ticker.is_empty() || !ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ClientError::configuration(format!("invalid ticker: {ticker:?}")));
        }
        let path = format!("/gex/{}", ticker.to_ascii_uppercase());

        let raw: Option<RawGex> = self.transport.send_optional(self.transport.get(&path)).await?;
        Ok(raw.map(GexData::from))
    }
}

#[async_trait]
impl GexProvider for GexClient {
    async fn get_gex(&self, ticker: &str) -> anyhow::Result<Option<GexData>> {
        Ok(self.fetch(ticker).await?)
    }
}
