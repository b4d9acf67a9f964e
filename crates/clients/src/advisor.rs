//! HTTP prediction advisors (ML model server, oracle service).
//!
//! Both speak the same contract: `POST {url}/predict` with an
//! [`AdvisorFeatures`] body, answered by a prediction object (bare or
//! wrapped in `{"prediction": ...}`). `204`, `404`, a `null` prediction, or
//! a body without advice all mean "no opinion".

use std::num::NonZeroU32;

use async_trait::async_trait;
use condor_core::{
    Advice, Advisor, AdvisorEndpoint, AdvisorFeatures, AdvisorKind, Direction, Prediction,
    Suitability, TopFactor,
};
use nonzero_ext::nonzero;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::http::HttpTransport;

/// Environment variable holding the shared advisor API key.
pub const ADVISOR_API_KEY_ENV: &str = "CONDOR_ADVISOR_API_KEY";

const API_KEY_HEADER: &str = "X-API-Key";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug)]
pub struct HttpAdvisorConfig {
    /// Name used in logs and reasoning.
    pub name: String,
    pub url: String,
    pub kind: AdvisorKind,
    pub timeout_secs: u64,
    pub requests_per_minute: NonZeroU32,
    pub api_key: Option<SecretString>,
}

impl HttpAdvisorConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: AdvisorKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            timeout_secs: 5,
            requests_per_minute: nonzero!(120u32),
            api_key: None,
        }
    }

    #[must_use]
    pub fn from_endpoint(endpoint: &AdvisorEndpoint, kind: AdvisorKind) -> Self {
        Self::new(&endpoint.name, &endpoint.url, kind).with_timeout_secs(endpoint.timeout_secs)
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Attaches `CONDOR_ADVISOR_API_KEY` when it is set and non-empty.
    #[must_use]
    pub fn with_api_key_from_env(self) -> Self {
        match std::env::var(ADVISOR_API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => self.with_api_key(SecretString::from(key)),
            _ => self,
        }
    }
}

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawPrediction {
    #[serde(default, alias = "probability", alias = "win_prob")]
    win_probability: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "recommendation", alias = "action")]
    advice: Option<String>,
    #[serde(default)]
    top_factors: Vec<RawFactor>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default, alias = "put_strike")]
    suggested_put_strike: Option<f64>,
    #[serde(default, alias = "call_strike")]
    suggested_call_strike: Option<f64>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    bullish_suitability: Option<f64>,
    #[serde(default)]
    bearish_suitability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawFactor {
    #[serde(alias = "feature")]
    name: String,
    #[serde(default, alias = "importance")]
    impact: f64,
}

fn parse_direction(raw: &str) -> Option<Direction> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "BULLISH" | "UP" | "LONG" => Some(Direction::Bullish),
        "BEARISH" | "DOWN" | "SHORT" => Some(Direction::Bearish),
        "NEUTRAL" | "FLAT" => Some(Direction::Neutral),
        _ => None,
    }
}

impl RawPrediction {
    /// `None` when the advisor gave no advice.
    fn into_prediction(self) -> Option<Prediction> {
        let advice = Advice::from(self.advice?.as_str());

        let suitability = match (self.bullish_suitability, self.bearish_suitability) {
            (Some(bullish), Some(bearish)) => Some(Suitability { bullish, bearish }),
            _ => None,
        };

        Some(Prediction {
            win_probability: self.win_probability.unwrap_or(0.0),
            confidence: self.confidence.unwrap_or(0.0),
            advice,
            top_factors: self
                .top_factors
                .into_iter()
                .map(|f| TopFactor {
                    name: f.name,
                    impact: f.impact,
                })
                .collect(),
            reasoning: self.reasoning.unwrap_or_default(),
            model_version: self.model_version.unwrap_or_default(),
            suggested_put_strike: self.suggested_put_strike,
            suggested_call_strike: self.suggested_call_strike,
            direction: self.direction.as_deref().and_then(parse_direction),
            suitability,
        })
    }
}

/// Unwraps `{"prediction": ...}` envelopes and decodes the prediction.
fn decode_body(body: serde_json::Value) -> Result<Option<Prediction>> {
    let inner = match body {
        serde_json::Value::Object(mut map) if map.contains_key("prediction") => {
            map.remove("prediction").unwrap_or(serde_json::Value::Null)
        }
        other => other,
    };
    if inner.is_null() {
        return Ok(None);
    }
    let raw: RawPrediction = serde_json::from_value(inner)?;
    Ok(raw.into_prediction())
}

// =============================================================================
// Client
// =============================================================================

/// An [`Advisor`] backed by a remote `/predict` endpoint.
pub struct HttpAdvisor {
    config: HttpAdvisorConfig,
    transport: HttpTransport,
}

impl std::fmt::Debug for HttpAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAdvisor")
            .field("name", &self.config.name)
            .field("kind", &self.config.kind)
            .field("url", &self.config.url)
            .finish_non_exhaustive()
    }
}

impl HttpAdvisor {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: HttpAdvisorConfig) -> Result<Self> {
        if config.name.trim().is_empty() {
            return Err(ClientError::configuration("advisor name is empty"));
        }
        let transport =
            HttpTransport::new(&config.url, config.requests_per_minute, config.timeout_secs)?;
        Ok(Self { config, transport })
    }

    /// Requests a prediction for `features`.
    ///
    /// # Errors
    /// Returns error on transport failure or an undecodable body.
    pub async fn request(&self, features: &AdvisorFeatures) -> Result<Option<Prediction>> {
        let mut request = self.transport.post("/predict").json(features);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }

        let body: Option<serde_json::Value> = self.transport.send_optional(request).await?;
        match body {
            Some(body) => decode_body(body),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn predict(&self, features: &AdvisorFeatures) -> anyhow::Result<Option<Prediction>> {
        Ok(self.request(features).await?)
    }

    fn kind(&self) -> AdvisorKind {
        self.config.kind
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
