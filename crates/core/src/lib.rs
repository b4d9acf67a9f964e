//! Core types, collaborator traits, and configuration for the iron condor
//! signal engine shared by the FORTRESS/PEGASUS/SAMSON bot family.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod market;
pub mod prediction;
pub mod pricing;
pub mod signal;
pub mod strikes;
pub mod traits;

pub use config::{
    AdvisorEndpoint, AdvisorsConfig, AppConfig, BotConfig, DatabaseConfig, GexConfig,
    SchedulerConfig, StrategyKind, TradierConfig,
};
pub use config_loader::ConfigLoader;
pub use error::CoreError;
pub use market::{GexData, GexRegime, MarketSnapshot, OptionQuote, OptionRight};
pub use prediction::{
    Advice, AdvisorFeatures, AdvisorKind, Direction, Prediction, Suitability, TopFactor,
};
pub use pricing::{IvConfidence, LegIv, Pricing, PricingSource};
pub use signal::{Signal, SignalSource};
pub use strikes::{StrikeSet, StrikeSource};
pub use traits::{Advisor, GexProvider, MarketDataProvider, QuoteService, SignalStore};
