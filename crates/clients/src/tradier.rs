//! Tradier brokerage REST client for underlying and option quotes.
//!
//! Implements [`MarketDataProvider`] (spot and VIX from `/markets/quotes`)
//! and [`QuoteService`] (option bid/ask by OCC symbol) behind a governor
//! rate limiter.
//!
//! # Example
//!
//! ```ignore
//! use condor_clients::{TradierClient, TradierClientConfig};
//! use condor_core::MarketDataProvider;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = TradierClient::from_env(TradierClientConfig::sandbox())?;
//!
//!     let spot = client.get_spot("SPY").await?;
//!     let vix = client.get_vix().await?;
//!     println!("SPY {spot:?} VIX {vix:?}");
//!
//!     Ok(())
//! }
//! ```

use std::num::NonZeroU32;

use async_trait::async_trait;
use condor_core::{MarketDataProvider, OptionQuote, QuoteService, TradierConfig};
use nonzero_ext::nonzero;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::http::HttpTransport;

// =============================================================================
// Constants
// =============================================================================

/// Tradier production API base URL.
pub const TRADIER_PROD_URL: &str = "https://api.tradier.com/v1";

/// Tradier sandbox API base URL (delayed data).
pub const TRADIER_SANDBOX_URL: &str = "https://sandbox.tradier.com/v1";

/// Environment variable holding the bearer token.
pub const TRADIER_TOKEN_ENV: &str = "TRADIER_API_TOKEN";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Tradier client.
#[derive(Debug, Clone)]
pub struct TradierClientConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Requests per minute limit.
    pub requests_per_minute: NonZeroU32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Symbol queried by [`MarketDataProvider::get_vix`].
    pub vix_symbol: String,
}

impl Default for TradierClientConfig {
    fn default() -> Self {
        Self {
            base_url: TRADIER_PROD_URL.to_string(),
            requests_per_minute: nonzero!(120u32),
            timeout_secs: 10,
            vix_symbol: "VIX".to_string(),
        }
    }
}

impl TradierClientConfig {
    /// Creates a configuration for the sandbox environment.
    #[must_use]
    pub fn sandbox() -> Self {
        Self {
            base_url: TRADIER_SANDBOX_URL.to_string(),
            ..Default::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the volatility index symbol.
    #[must_use]
    pub fn with_vix_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.vix_symbol = symbol.into();
        self
    }
}

impl TryFrom<&TradierConfig> for TradierClientConfig {
    type Error = ClientError;

    fn try_from(cfg: &TradierConfig) -> Result<Self> {
        let requests_per_minute = NonZeroU32::new(cfg.requests_per_minute)
            .ok_or_else(|| ClientError::configuration("tradier.requests_per_minute must be > 0"))?;
        Ok(Self {
            base_url: cfg.api_url.clone(),
            requests_per_minute,
            timeout_secs: cfg.timeout_secs,
            vix_symbol: cfg.vix_symbol.clone(),
        })
    }
}

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawQuotesResponse {
    #[serde(default)]
    quotes: Option<RawQuotes>,
}

#[derive(Debug, Deserialize)]
struct RawQuotes {
    /// A single object when one symbol matched, an array otherwise.
    #[serde(default)]
    quote: Option<OneOrMany<RawQuote>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    symbol: String,
    #[serde(default)]
    last: Option<f64>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
}

/// A quote for one symbol as returned by Tradier.
#[derive(Debug, Clone, PartialEq)]
pub struct TradierQuote {
    pub symbol: String,
    pub last: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl From<RawQuote> for TradierQuote {
    fn from(raw: RawQuote) -> Self {
        let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
        Self {
            symbol: raw.symbol,
            last: positive(raw.last),
            // A zero bid is a real quote for far OTM options.
            bid: raw.bid.filter(|x| x.is_finite() && *x >= 0.0),
            ask: positive(raw.ask),
        }
    }
}

impl TradierQuote {
    /// Last trade, else the bid/ask midpoint.
    #[must_use]
    pub fn price(&self) -> Option<f64> {
        self.last
            .or_else(|| self.option_quote().map(|q| q.mid()).filter(|m| *m > 0.0))
    }

    #[must_use]
    pub fn option_quote(&self) -> Option<OptionQuote> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(OptionQuote { bid, ask }),
            _ => None,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Tradier REST client with rate limiting.
pub struct TradierClient {
    config: TradierClientConfig,
    transport: HttpTransport,
    token: SecretString,
}

impl std::fmt::Debug for TradierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradierClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_minute", &self.config.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl TradierClient {
    /// Creates a new client with the given configuration and token.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: TradierClientConfig, token: SecretString) -> Result<Self> {
        if token.expose_secret().trim().is_empty() {
            return Err(ClientError::configuration("Tradier token is empty"));
        }
        let transport =
            HttpTransport::new(&config.base_url, config.requests_per_minute, config.timeout_secs)?;
        Ok(Self {
            config,
            transport,
            token,
        })
    }

    /// Creates a client reading the token from `TRADIER_API_TOKEN`.
    ///
    /// # Errors
    /// Returns error if the variable is unset or the client cannot be built.
    pub fn from_env(config: TradierClientConfig) -> Result<Self> {
        let token = std::env::var(TRADIER_TOKEN_ENV).map_err(|_| {
            ClientError::configuration(format!("{TRADIER_TOKEN_ENV} environment variable not set"))
        })?;
        Self::new(config, SecretString::from(token))
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Fetches quotes for the given symbols. Unknown symbols are omitted.
    ///
    /// # Errors
    /// Returns error if the API call fails or the body cannot be decoded.
    pub async fn get_quotes(&self, symbols: &[&str]) -> Result<Vec<TradierQuote>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let joined = symbols.join(",");
        let request = self
            .transport
            .get("/markets/quotes")
            .bearer_auth(self.token.expose_secret())
            .query(&[("symbols", joined.as_str()), ("greeks", "false")]);

        let response: RawQuotesResponse = self.transport.send(request).await?;

        Ok(response
            .quotes
            .and_then(|q| q.quote)
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(TradierQuote::from)
            .collect())
    }

    /// Fetches the quote for one symbol, `None` if Tradier does not know it.
    ///
    /// # Errors
    /// Returns error if the API call fails.
    pub async fn get_quote(&self, symbol: &str) -> Result<Option<TradierQuote>> {
        Ok(self
            .get_quotes(&[symbol])
            .await?
            .into_iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol)))
    }
}

#[async_trait]
impl MarketDataProvider for TradierClient {
    async fn get_spot(&self, ticker: &str) -> anyhow::Result<Option<f64>> {
        Ok(self.get_quote(ticker).await?.and_then(|q| q.price()))
    }

    async fn get_vix(&self) -> anyhow::Result<Option<f64>> {
        Ok(self
            .get_quote(&self.config.vix_symbol)
            .await?
            .and_then(|q| q.price()))
    }
}

#[async_trait]
impl QuoteService for TradierClient {
    async fn get_option_quote(&self, occ_symbol: &str) -> anyhow::Result<Option<OptionQuote>> {
        Ok(self
            .get_quote(occ_symbol)
            .await?
            .and_then(|q| q.option_quote()))
    }
}
