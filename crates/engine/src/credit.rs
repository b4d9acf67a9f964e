//! Credit estimation for an iron condor: live quotes first, formula second.

use std::sync::Arc;

use chrono::NaiveDate;
use condor_core::{OptionQuote, OptionRight, Pricing, PricingSource, QuoteService, StrikeSet};
use tracing::{info, warn};

use crate::calendar::occ_symbol;

/// Base credit per leg as a fraction of spread width at one expected move, VIX 20.
const FORMULA_BASE_CREDIT_PCT: f64 = 0.15;
const FORMULA_REFERENCE_VIX: f64 = 20.0;
/// Normalised distances below this are treated as this.
const FORMULA_MIN_NORMALIZED_DISTANCE: f64 = 0.1;
const FORMULA_MIN_CREDIT_PCT: f64 = 0.02;
const FORMULA_MAX_CREDIT_PCT: f64 = 0.40;

/// Quotes for the four legs of one condor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegQuotes {
    pub put_long: OptionQuote,
    pub put_short: OptionQuote,
    pub call_short: OptionQuote,
    pub call_long: OptionQuote,
}

impl LegQuotes {
    /// `(put_credit, call_credit)` selling at the bid and buying at the ask.
    #[must_use]
    pub fn natural_credits(&self) -> (f64, f64) {
        (
            self.put_short.bid - self.put_long.ask,
            self.call_short.bid - self.call_long.ask,
        )
    }

    /// `(put_credit, call_credit)` at mid prices.
    #[must_use]
    pub fn mid_credits(&self) -> (f64, f64) {
        (
            self.put_short.mid() - self.put_long.mid(),
            self.call_short.mid() - self.call_long.mid(),
        )
    }
}

/// Pricing plus the quotes it was derived from, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditEstimate {
    pub pricing: Pricing,
    pub quotes: Option<LegQuotes>,
    /// Why live pricing was not used, when it was not.
    pub note: Option<String>,
}

/// Prices iron condors for one option root.
pub struct CreditEstimator {
    quotes: Option<Arc<dyn QuoteService>>,
    option_root: String,
}

impl CreditEstimator {
    #[must_use]
    pub fn new(quotes: Option<Arc<dyn QuoteService>>, option_root: impl Into<String>) -> Self {
        Self {
            quotes,
            option_root: option_root.into(),
        }
    }

    /// Prices `strikes` for `contracts` contracts expiring on `expiration`.
    ///
    /// Never fails: missing or unusable quotes degrade to
    /// [`PricingSource::Estimated`].
    pub async fn estimate(
        &self,
        strikes: &StrikeSet,
        spot: f64,
        expected_move: f64,
        vix: f64,
        expiration: NaiveDate,
        contracts: u32,
    ) -> CreditEstimate {
        let width = strikes.spread_width();

        let fetched = match &self.quotes {
            Some(service) => self.fetch_legs(service.as_ref(), strikes, expiration).await,
            None => Err("no quote service configured".to_string()),
        };

        let note = match fetched {
            Ok(legs) => {
                let (put, call) = legs.natural_credits();
                if put > 0.0 && call > 0.0 {
                    return CreditEstimate {
                        pricing: Pricing::from_credits(
                            put,
                            call,
                            width,
                            contracts,
                            PricingSource::Quoted,
                        ),
                        quotes: Some(legs),
                        note: None,
                    };
                }
                let (put, call) = legs.mid_credits();
                if put > 0.0 && call > 0.0 {
                    return CreditEstimate {
                        pricing: Pricing::from_credits(
                            put,
                            call,
                            width,
                            contracts,
                            PricingSource::QuotedMid,
                        ),
                        quotes: Some(legs),
                        note: Some("natural credit non-positive, priced at mids".to_string()),
                    };
                }
                format!("quoted credit non-positive (put {put:.2}, call {call:.2})")
            }
            Err(reason) => reason,
        };

        info!(
            root = %self.option_root,
            strikes = %strikes.describe(),
            reason = %note,
            "Falling back to estimated credit"
        );
        let (put, call) = formula_credits(strikes, spot, expected_move, vix);
        CreditEstimate {
            pricing: Pricing::from_credits(put, call, width, contracts, PricingSource::Estimated),
            quotes: None,
            note: Some(note),
        }
    }

    async fn fetch_legs(
        &self,
        service: &dyn QuoteService,
        strikes: &StrikeSet,
        expiration: NaiveDate,
    ) -> Result<LegQuotes, String> {
        let legs = [
            (OptionRight::Put, strikes.put_long()),
            (OptionRight::Put, strikes.put_short()),
            (OptionRight::Call, strikes.call_short()),
            (OptionRight::Call, strikes.call_long()),
        ];

        let mut quotes = Vec::with_capacity(legs.len());
        for (right, strike) in legs {
            let symbol = occ_symbol(&self.option_root, expiration, right, strike);
            match service.get_option_quote(&symbol).await {
                Ok(Some(quote)) if quote.is_usable() => quotes.push(quote),
                Ok(Some(quote)) => {
                    return Err(format!(
                        "unusable quote for {symbol} (bid {}, ask {})",
                        quote.bid, quote.ask
                    ))
                }
                Ok(None) => return Err(format!("no quote for {symbol}")),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Option quote request failed");
                    return Err(format!("quote request for {symbol} failed: {e}"));
                }
            }
        }

        match quotes.as_slice() {
            [put_long, put_short, call_short, call_long] => Ok(LegQuotes {
                put_long: *put_long,
                put_short: *put_short,
                call_short: *call_short,
                call_long: *call_long,
            }),
            _ => Err("incomplete leg quotes".to_string()),
        }
    }
}

/// Formula credit per side, `(put_credit, call_credit)`.
///
/// Each side is `width * 0.15 * (vix / 20) / max(distance / EM, 0.1)`, clamped
/// to 2%-40% of the spread width.
#[must_use]
pub fn formula_credits(strikes: &StrikeSet, spot: f64, expected_move: f64, vix: f64) -> (f64, f64) {
    let width = strikes.spread_width();
    let vol_factor = if vix.is_finite() && vix > 0.0 {
        vix / FORMULA_REFERENCE_VIX
    } else {
        1.0
    };
    let em = if expected_move.is_finite() && expected_move > 0.0 {
        expected_move
    } else {
        spot * 0.005
    };

    let side = |distance: f64| {
        let normalized = (distance / em).max(FORMULA_MIN_NORMALIZED_DISTANCE);
        (width * FORMULA_BASE_CREDIT_PCT * vol_factor / normalized)
            .clamp(width * FORMULA_MIN_CREDIT_PCT, width * FORMULA_MAX_CREDIT_PCT)
    };

    (
        side(spot - strikes.put_short()),
        side(strikes.call_short() - spot),
    )
}
