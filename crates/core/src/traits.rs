//! Narrow interfaces to the collaborators a scan depends on.
//!
//! Every method may fail or return `None`; the engine treats both as
//! "unavailable" and never lets the failure escape a scan.

use anyhow::Result;
use async_trait::async_trait;

use crate::market::{GexData, OptionQuote};
use crate::prediction::{AdvisorFeatures, AdvisorKind, Prediction};
use crate::signal::Signal;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_spot(&self, ticker: &str) -> Result<Option<f64>>;

    async fn get_vix(&self) -> Result<Option<f64>>;
}

#[async_trait]
pub trait GexProvider: Send + Sync {
    async fn get_gex(&self, ticker: &str) -> Result<Option<GexData>>;
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    /// Fetches bid/ask for an OCC option symbol (e.g. `SPY250117P00590000`).
    async fn get_option_quote(&self, occ_symbol: &str) -> Result<Option<OptionQuote>>;
}

/// A prediction source consulted by the arbiter.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Scores the given features. `Ok(None)` means the advisor has no opinion.
    async fn predict(&self, features: &AdvisorFeatures) -> Result<Option<Prediction>>;

    fn kind(&self) -> AdvisorKind;

    /// Human-readable name for logs (e.g. "prophet-v3").
    fn name(&self) -> &str;
}

/// Sink for finished signals, called once per scan.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Persists the signal and returns its store id.
    async fn save(&self, signal: &Signal) -> Result<i64>;
}
