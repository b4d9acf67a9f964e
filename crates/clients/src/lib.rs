//! HTTP collaborators for the iron condor signal engine.
//!
//! This crate provides:
//! - [`TradierClient`]: spot, VIX, and option quotes (`MarketDataProvider`, `QuoteService`)
//! - [`GexClient`]: gamma-exposure walls and regime (`GexProvider`)
//! - [`HttpAdvisor`]: ML and oracle prediction services (`Advisor`)
//!
//! Every client shares a governor-limited reqwest transport and maps
//! failures into [`ClientError`].
//!
//! # Environment
//!
//! - `TRADIER_API_TOKEN`: Tradier bearer token
//! - `CONDOR_ADVISOR_API_KEY`: optional key sent to advisors as `X-API-Key`

pub mod advisor;
pub mod error;
pub mod gex;
mod http;
pub mod tradier;

pub use advisor::{HttpAdvisor, HttpAdvisorConfig, ADVISOR_API_KEY_ENV};
pub use error::{ClientError, Result};
pub use gex::{GexClient, GexClientConfig};
pub use tradier::{
    TradierClient, TradierClientConfig, TradierQuote, TRADIER_PROD_URL, TRADIER_SANDBOX_URL,
    TRADIER_TOKEN_ENV,
};
