//! Advisor predictions and the features advisors are asked to score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::market::{GexRegime, MarketSnapshot};

/// Which advisor produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdvisorKind {
    /// Primary ML classifier.
    Ml,
    /// Backup heuristic/ML advisor (Oracle/Prophet).
    Oracle,
}

impl std::fmt::Display for AdvisorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ml => write!(f, "ML"),
            Self::Oracle => write!(f, "ORACLE"),
        }
    }
}

/// Trade recommendation carried by a prediction.
///
/// Unrecognised values are preserved verbatim in [`Advice::Other`] and treated
/// as "do not trade".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Advice {
    TradeFull,
    TradeReduced,
    Skip,
    Enter,
    Hold,
    Exit,
    Other(String),
}

impl Advice {
    /// Returns true for advice values that endorse opening a position.
    #[must_use]
    pub fn endorses_trade(&self) -> bool {
        matches!(self, Self::TradeFull | Self::TradeReduced | Self::Enter)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TradeFull => "TRADE_FULL",
            Self::TradeReduced => "TRADE_REDUCED",
            Self::Skip => "SKIP",
            Self::Enter => "ENTER",
            Self::Hold => "HOLD",
            Self::Exit => "EXIT",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for Advice {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRADE_FULL" | "TRADE" => Self::TradeFull,
            "TRADE_REDUCED" => Self::TradeReduced,
            "SKIP" | "SKIP_TODAY" | "NO_TRADE" => Self::Skip,
            "ENTER" => Self::Enter,
            "HOLD" => Self::Hold,
            "EXIT" => Self::Exit,
            _ => Self::Other(raw.to_string()),
        }
    }
}

impl From<String> for Advice {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<Advice> for String {
    fn from(advice: Advice) -> Self {
        advice.as_str().to_string()
    }
}

impl std::fmt::Display for Advice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional bias for directional-spread bots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bullish => Self::Bearish,
            Self::Bearish => Self::Bullish,
            Self::Neutral => Self::Neutral,
        }
    }

    #[must_use]
    pub const fn is_directional(self) -> bool {
        !matches!(self, Self::Neutral)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// One entry of an advisor's ranked feature attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopFactor {
    pub name: String,
    /// Signed contribution; positive favours trading.
    pub impact: f64,
}

/// Per-direction suitability scores some advisors report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Suitability {
    pub bullish: f64,
    pub bearish: f64,
}

/// Output of one advisor for one scan. Never mutated after creation.
///
/// Optional capabilities (suggested strikes, direction, suitability) are
/// always present as fields and simply `None` when the advisor does not
/// provide them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub win_probability: f64,
    pub confidence: f64,
    pub advice: Advice,
    #[serde(default)]
    pub top_factors: Vec<TopFactor>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub model_version: String,
    #[serde(default)]
    pub suggested_put_strike: Option<f64>,
    #[serde(default)]
    pub suggested_call_strike: Option<f64>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub suitability: Option<Suitability>,
}

impl Prediction {
    /// Creates a prediction with the required fields and no optional capabilities.
    #[must_use]
    pub fn new(win_probability: f64, confidence: f64, advice: Advice) -> Self {
        Self {
            win_probability,
            confidence,
            advice,
            top_factors: Vec::new(),
            reasoning: String::new(),
            model_version: String::new(),
            suggested_put_strike: None,
            suggested_call_strike: None,
            direction: None,
            suitability: None,
        }
    }

    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    #[must_use]
    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    #[must_use]
    pub fn with_factor(mut self, name: impl Into<String>, impact: f64) -> Self {
        self.top_factors.push(TopFactor {
            name: name.into(),
            impact,
        });
        self
    }

    #[must_use]
    pub fn with_suggested_strikes(mut self, put: f64, call: f64) -> Self {
        self.suggested_put_strike = Some(put);
        self.suggested_call_strike = Some(call);
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    #[must_use]
    pub fn with_suitability(mut self, bullish: f64, bearish: f64) -> Self {
        self.suitability = Some(Suitability { bullish, bearish });
        self
    }

    #[must_use]
    pub fn has_suitability_scores(&self) -> bool {
        self.suitability.is_some()
    }

    #[must_use]
    pub fn has_suggested_strikes(&self) -> bool {
        self.suggested_put_strike.is_some() && self.suggested_call_strike.is_some()
    }
}

/// Feature record sent to advisors, derived from the scan's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorFeatures {
    pub bot: String,
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub spot: f64,
    pub vix: f64,
    pub expected_move: f64,
    pub regime: GexRegime,
    pub net_gex: f64,
    pub call_wall_distance_pct: Option<f64>,
    pub put_wall_distance_pct: Option<f64>,
    pub call_wall_distance_sd: Option<f64>,
    pub put_wall_distance_sd: Option<f64>,
    pub flip_distance_pct: Option<f64>,
    /// 0 = Monday.
    pub day_of_week: u32,
}

impl AdvisorFeatures {
    /// Derives the feature record from a snapshot and its expected move.
    #[must_use]
    pub fn from_snapshot(bot: &str, snapshot: &MarketSnapshot, expected_move: f64) -> Self {
        use chrono::Datelike;

        let in_sd = |distance: Option<f64>| {
            distance
                .filter(|_| expected_move > 0.0)
                .map(|d| d * snapshot.spot / expected_move)
        };
        let call_pct = snapshot.call_wall_distance_pct();
        let put_pct = snapshot.put_wall_distance_pct();

        Self {
            bot: bot.to_string(),
            ticker: snapshot.ticker.clone(),
            timestamp: snapshot.timestamp,
            spot: snapshot.spot,
            vix: snapshot.vix,
            expected_move,
            regime: snapshot.regime,
            net_gex: snapshot.net_gex,
            call_wall_distance_pct: call_pct,
            put_wall_distance_pct: put_pct,
            call_wall_distance_sd: in_sd(call_pct),
            put_wall_distance_sd: in_sd(put_pct),
            flip_distance_pct: snapshot
                .flip_point
                .map(|f| (snapshot.spot - f) / snapshot.spot),
            day_of_week: snapshot.timestamp.weekday().num_days_from_monday(),
        }
    }
}
