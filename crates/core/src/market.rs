//! Market-state types: the per-scan snapshot and the raw GEX payload it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dealer gamma regime reported by the GEX provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GexRegime {
    /// Dealers long gamma; hedging dampens moves.
    Positive,
    /// Dealers short gamma; hedging amplifies moves.
    Negative,
    Neutral,
}

impl GexRegime {
    /// Classifies a regime from the sign of net GEX.
    #[must_use]
    pub fn from_net_gex(net_gex: f64) -> Self {
        if net_gex > 0.0 {
            Self::Positive
        } else if net_gex < 0.0 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    /// Parses a provider regime tag, tolerating case and common synonyms.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "POSITIVE" | "POS" | "LONG_GAMMA" => Some(Self::Positive),
            "NEGATIVE" | "NEG" | "SHORT_GAMMA" => Some(Self::Negative),
            "NEUTRAL" | "FLAT" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for GexRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "POSITIVE"),
            Self::Negative => write!(f, "NEGATIVE"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// GEX levels for one underlying as returned by a [`crate::GexProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GexData {
    pub call_wall: Option<f64>,
    pub put_wall: Option<f64>,
    pub regime: GexRegime,
    pub net_gex: f64,
    pub flip_point: Option<f64>,
    pub spot_price: Option<f64>,
    /// When the provider computed these levels, if it reports it.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Everything a scan knows about the market, fetched once per cycle.
///
/// Immutable after construction. A snapshot older than the bot's staleness
/// threshold is discarded and refetched at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub spot: f64,
    pub vix: f64,
    pub regime: GexRegime,
    pub net_gex: f64,
    pub call_wall: Option<f64>,
    pub put_wall: Option<f64>,
    pub flip_point: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Age of the snapshot relative to `now`, in whole seconds.
    #[must_use]
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_seconds()
    }

    /// Returns true if the snapshot is no older than `max_age_secs`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
        self.age_secs(now) <= max_age
    }

    /// Distance from spot to the call wall as a fraction of spot.
    #[must_use]
    pub fn call_wall_distance_pct(&self) -> Option<f64> {
        self.call_wall.map(|w| (w - self.spot) / self.spot)
    }

    /// Distance from spot to the put wall as a fraction of spot.
    #[must_use]
    pub fn put_wall_distance_pct(&self) -> Option<f64> {
        self.put_wall.map(|w| (self.spot - w) / self.spot)
    }
}

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Single-letter code used in OCC symbols.
    #[must_use]
    pub const fn occ_code(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// Top-of-book quote for a single option contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub bid: f64,
    pub ask: f64,
}

impl OptionQuote {
    #[must_use]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// A quote is usable when both sides are non-negative and not crossed.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.bid.is_finite()
            && self.ask.is_finite()
            && self.bid >= 0.0
            && self.ask > 0.0
            && self.ask >= self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot_at(timestamp: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            ticker: "SPY".to_string(),
            spot: 600.0,
            vix: 15.0,
            regime: GexRegime::Positive,
            net_gex: 1.5e9,
            call_wall: Some(606.0),
            put_wall: Some(591.0),
            flip_point: Some(595.0),
            timestamp,
        }
    }

    #[test]
    fn regime_from_net_gex_sign() {
        assert_eq!(GexRegime::from_net_gex(1.0), GexRegime::Positive);
        assert_eq!(GexRegime::from_net_gex(-1.0), GexRegime::Negative);
        assert_eq!(GexRegime::from_net_gex(0.0), GexRegime::Neutral);
    }

    #[test]
    fn regime_parse_is_case_insensitive() {
        assert_eq!(GexRegime::parse("positive"), Some(GexRegime::Positive));
        assert_eq!(GexRegime::parse(" NEG "), Some(GexRegime::Negative));
        assert_eq!(GexRegime::parse("sideways"), None);
    }

    #[test]
    fn regime_serializes_uppercase() {
        let json = serde_json::to_string(&GexRegime::Negative).unwrap();
        assert_eq!(json, "\"NEGATIVE\"");
    }

    #[test]
    fn snapshot_freshness_respects_threshold() {
        let now = Utc::now();
        let snap = snapshot_at(now - Duration::seconds(90));
        assert!(snap.is_fresh(now, 120));
        assert!(!snap.is_fresh(now, 60));
    }

    #[test]
    fn wall_distances_are_fractions_of_spot() {
        let snap = snapshot_at(Utc::now());
        assert!((snap.call_wall_distance_pct().unwrap() - 0.01).abs() < 1e-12);
        assert!((snap.put_wall_distance_pct().unwrap() - 0.015).abs() < 1e-12);
    }

    #[test]
    fn quote_usability() {
        assert!(OptionQuote { bid: 0.5, ask: 0.6 }.is_usable());
        assert!(OptionQuote { bid: 0.0, ask: 0.05 }.is_usable());
        assert!(!OptionQuote { bid: 0.7, ask: 0.6 }.is_usable());
        assert!(!OptionQuote { bid: 0.0, ask: 0.0 }.is_usable());
        assert!(!OptionQuote { bid: f64::NAN, ask: 0.6 }.is_usable());
    }
}
