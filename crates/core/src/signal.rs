//! The per-scan decision record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::MarketSnapshot;
use crate::prediction::{Advice, AdvisorKind, Direction, Prediction};
use crate::pricing::{LegIv, Pricing};
use crate::strikes::{StrikeSet, StrikeSource};

/// Why a signal exists: the strike tier for tradeable signals, or the block reason.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SignalSource {
    /// Tradeable; strikes came from this tier.
    Strikes(StrikeSource),
    /// Spot/VIX or required GEX data missing.
    BlockedNoData,
    /// Snapshot still stale after one refetch.
    BlockedStaleData,
    /// VIX above the bot's ceiling.
    BlockedVixTooHigh,
    /// The authoritative advisor did not endorse trading.
    BlockedNoTrade(AdvisorKind),
    /// No advisor produced a prediction and advisor-less trading is disabled.
    BlockedNoPrediction,
    /// Advisor-less fallback probability under the bot's minimum.
    BlockedBelowThreshold,
    /// No valid trade could be built: strikes failed even after the emergency
    /// fallback, or the expiration date is out of range.
    BlockedInvalidStrikes,
}

impl SignalSource {
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::Strikes(source) => source.tag(),
            Self::BlockedNoData => "BLOCKED_NO_DATA".to_string(),
            Self::BlockedStaleData => "BLOCKED_STALE_DATA".to_string(),
            Self::BlockedVixTooHigh => "BLOCKED_VIX_TOO_HIGH".to_string(),
            Self::BlockedNoTrade(kind) => format!("BLOCKED_{kind}_NO_TRADE"),
            Self::BlockedNoPrediction => "BLOCKED_NO_PREDICTION".to_string(),
            Self::BlockedBelowThreshold => "BLOCKED_BELOW_THRESHOLD".to_string(),
            Self::BlockedInvalidStrikes => "BLOCKED_INVALID_STRIKES".to_string(),
        }
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Self::Strikes(_))
    }
}

impl std::fmt::Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}

impl From<SignalSource> for String {
    fn from(source: SignalSource) -> Self {
        source.tag()
    }
}

impl TryFrom<String> for SignalSource {
    type Error = String;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        let source = match tag.as_str() {
            "ADVISOR" => Self::Strikes(StrikeSource::Advisor),
            "GEX" => Self::Strikes(StrikeSource::Gex),
            "EMERGENCY" => Self::Strikes(StrikeSource::Emergency),
            "BLOCKED_NO_DATA" => Self::BlockedNoData,
            "BLOCKED_STALE_DATA" => Self::BlockedStaleData,
            "BLOCKED_VIX_TOO_HIGH" => Self::BlockedVixTooHigh,
            "BLOCKED_ML_NO_TRADE" => Self::BlockedNoTrade(AdvisorKind::Ml),
            "BLOCKED_ORACLE_NO_TRADE" => Self::BlockedNoTrade(AdvisorKind::Oracle),
            "BLOCKED_NO_PREDICTION" => Self::BlockedNoPrediction,
            "BLOCKED_BELOW_THRESHOLD" => Self::BlockedBelowThreshold,
            "BLOCKED_INVALID_STRIKES" => Self::BlockedInvalidStrikes,
            other => {
                let multiplier = other
                    .strip_prefix("SD_")
                    .and_then(|m| m.parse::<f64>().ok())
                    .ok_or_else(|| format!("unknown signal source: {other}"))?;
                Self::Strikes(StrikeSource::Sd(multiplier))
            }
        };
        Ok(source)
    }
}

/// Complete, auditable outcome of one scan cycle.
///
/// Every exit path of a scan produces one of these, valid or blocked, with
/// enough context in `reasoning` to explain the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub scan_id: Uuid,
    pub bot: String,
    pub ticker: String,
    pub created_at: DateTime<Utc>,
    pub snapshot: Option<MarketSnapshot>,
    pub expected_move: Option<f64>,
    pub strikes: Option<StrikeSet>,
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub leg_ivs: Vec<LegIv>,
    pub effective_win_probability: f64,
    pub confidence: f64,
    pub prediction_source: Option<AdvisorKind>,
    pub advice: Option<Advice>,
    pub ml_prediction: Option<Prediction>,
    pub backup_prediction: Option<Prediction>,
    pub direction: Option<Direction>,
    pub contracts: u32,
    pub source: SignalSource,
    pub reasoning: String,
    pub is_valid: bool,
}

impl Signal {
    /// Creates a blocked (invalid) signal with the given reason.
    #[must_use]
    pub fn blocked(
        bot: impl Into<String>,
        ticker: impl Into<String>,
        source: SignalSource,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            bot: bot.into(),
            ticker: ticker.into(),
            created_at: Utc::now(),
            snapshot: None,
            expected_move: None,
            strikes: None,
            pricing: None,
            leg_ivs: Vec::new(),
            effective_win_probability: 0.0,
            confidence: 0.0,
            prediction_source: None,
            advice: None,
            ml_prediction: None,
            backup_prediction: None,
            direction: None,
            contracts: 0,
            source,
            reasoning: reasoning.into(),
            is_valid: false,
        }
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: MarketSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    #[must_use]
    pub fn with_expected_move(mut self, expected_move: f64) -> Self {
        self.expected_move = Some(expected_move);
        self
    }

    /// One-line summary for logs and CLI output.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.strikes, &self.pricing) {
            (Some(strikes), Some(pricing)) if self.is_valid => format!(
                "{} {} {} x{} credit ${:.2} ({}) win_p={:.2} via {}",
                self.bot,
                self.ticker,
                strikes.describe(),
                self.contracts,
                pricing.total_credit,
                pricing.source,
                self.effective_win_probability,
                self.prediction_source
                    .map_or_else(|| "LOCAL".to_string(), |k| k.to_string()),
            ),
            _ => format!("{} {} {}", self.bot, self.ticker, self.source),
        }
    }
}
