//! Credit/risk estimates for a strike set.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::OptionRight;

/// Where a credit estimate came from, in decreasing order of precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingSource {
    /// Natural credit: short bid minus long ask.
    Quoted,
    /// Mid-price credit after the natural credit came out non-positive.
    QuotedMid,
    /// Formula estimate; no usable quotes.
    Estimated,
}

impl PricingSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quoted => "QUOTED",
            Self::QuotedMid => "QUOTED_MID",
            Self::Estimated => "ESTIMATED",
        }
    }

    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Estimated)
    }
}

impl std::fmt::Display for PricingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-share credits and per-position dollar risk for an iron condor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub put_credit: f64,
    pub call_credit: f64,
    pub total_credit: f64,
    pub max_profit: Decimal,
    pub max_loss: Decimal,
    pub contracts: u32,
    pub source: PricingSource,
}

impl Pricing {
    /// Builds pricing from per-share leg credits.
    ///
    /// `max_profit = total_credit * 100 * contracts` and
    /// `max_loss = (spread_width - total_credit) * 100 * contracts`, in dollars
    /// rounded to cents.
    #[must_use]
    pub fn from_credits(
        put_credit: f64,
        call_credit: f64,
        spread_width: f64,
        contracts: u32,
        source: PricingSource,
    ) -> Self {
        let total_credit = put_credit + call_credit;
        let multiplier = 100.0 * f64::from(contracts);
        let to_dollars = |v: f64| Decimal::from_f64(v).unwrap_or_default().round_dp(2);

        Self {
            put_credit,
            call_credit,
            total_credit,
            max_profit: to_dollars(total_credit * multiplier),
            max_loss: to_dollars((spread_width - total_credit) * multiplier),
            contracts,
            source,
        }
    }
}

/// Confidence tier attached to an implied-volatility solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IvConfidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for IvConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Implied volatility of one short leg, solved from its quoted mid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegIv {
    pub right: OptionRight,
    pub strike: f64,
    pub mid: f64,
    pub iv: f64,
    pub converged: bool,
    pub confidence: IvConfidence,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn max_profit_and_loss_scale_by_contracts() {
        let pricing = Pricing::from_credits(0.25, 0.20, 2.0, 3, PricingSource::Quoted);
        assert!((pricing.total_credit - 0.45).abs() < 1e-12);
        assert_eq!(pricing.max_profit, dec!(135.00));
        assert_eq!(pricing.max_loss, dec!(465.00));
    }

    #[test]
    fn estimated_source_is_not_live() {
        assert!(PricingSource::Quoted.is_live());
        assert!(PricingSource::QuotedMid.is_live());
        assert!(!PricingSource::Estimated.is_live());
        assert_eq!(PricingSource::Estimated.to_string(), "ESTIMATED");
    }
}
