//! Short-strike selection with an absolute expected-move floor.
//!
//! Tiers are tried in priority order (advisor, GEX walls, SD fallback). Every
//! tier is checked against the same floor, measured in expected-move units on
//! the rounded strikes; a tier that lands inside the floor is skipped, never
//! partially accepted.

use condor_core::{BotConfig, StrikeSet, StrikeSource};
use serde::Serialize;

use crate::error::StrikeError;

/// Expected move is clamped to this fraction of spot from below...
pub const MIN_EM_PCT: f64 = 0.005;
/// ...and from above.
pub const MAX_EM_PCT: f64 = 0.05;
/// Advisor strikes must sit between these distances from spot.
pub const ADVISOR_MIN_DISTANCE_PCT: f64 = 0.005;
pub const ADVISOR_MAX_DISTANCE_PCT: f64 = 0.05;
/// Minimum emergency distance as a fraction of spot.
pub const EMERGENCY_DISTANCE_PCT: f64 = 0.02;

const ROUNDING_EPSILON: f64 = 1e-9;

/// Per-bot geometry for strike selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrikeParams {
    /// MIN_SD: minimum short-strike distance in expected-move units.
    pub sd_multiplier: f64,
    pub strike_increment: f64,
    pub spread_width: f64,
}

impl From<&BotConfig> for StrikeParams {
    fn from(cfg: &BotConfig) -> Self {
        Self {
            sd_multiplier: cfg.sd_multiplier,
            strike_increment: cfg.strike_increment,
            spread_width: cfg.spread_width,
        }
    }
}

/// Inputs for one selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrikeRequest {
    pub spot: f64,
    pub expected_move: f64,
    pub call_wall: Option<f64>,
    pub put_wall: Option<f64>,
    pub advisor_put: Option<f64>,
    pub advisor_call: Option<f64>,
}

impl StrikeRequest {
    #[must_use]
    pub fn new(spot: f64, expected_move: f64) -> Self {
        Self {
            spot,
            expected_move,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_walls(mut self, put_wall: Option<f64>, call_wall: Option<f64>) -> Self {
        self.put_wall = put_wall;
        self.call_wall = call_wall;
        self
    }

    #[must_use]
    pub fn with_advisor_strikes(mut self, put: Option<f64>, call: Option<f64>) -> Self {
        self.advisor_put = put;
        self.advisor_call = call;
        self
    }
}

/// Result of a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeSelection {
    pub strikes: StrikeSet,
    /// Expected move after the sanity clamp; the floor is measured in this.
    pub expected_move: f64,
    /// Floor distance in price units (`sd_multiplier * expected_move`).
    pub floor_distance: f64,
    /// Why higher-priority tiers were passed over, in evaluation order.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StrikeSelector {
    params: StrikeParams,
}

impl StrikeSelector {
    #[must_use]
    pub fn new(params: StrikeParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &StrikeParams {
        &self.params
    }

    /// Rounds a put strike down to the increment (away from spot).
    #[must_use]
    pub fn round_put(&self, strike: f64) -> f64 {
        let inc = self.params.strike_increment;
        ((strike / inc) + ROUNDING_EPSILON).floor() * inc
    }

    /// Rounds a call strike up to the increment (away from spot).
    #[must_use]
    pub fn round_call(&self, strike: f64) -> f64 {
        let inc = self.params.strike_increment;
        ((strike / inc) - ROUNDING_EPSILON).ceil() * inc
    }

    /// Selects the short strikes and builds the iron condor.
    ///
    /// # Errors
    /// [`StrikeError::InvalidInput`] for a non-positive spot or parameters,
    /// [`StrikeError::Unrecoverable`] when even the emergency set violates the
    /// strike ordering (e.g. the long put would be at or below zero).
    pub fn select(&self, request: &StrikeRequest) -> Result<StrikeSelection, StrikeError> {
        let StrikeParams {
            sd_multiplier,
            strike_increment,
            spread_width,
        } = self.params;
        let spot = request.spot;

        if !(spot.is_finite() && spot > 0.0) {
            return Err(StrikeError::InvalidInput(format!("spot {spot}")));
        }
        if !(sd_multiplier > 0.0 && strike_increment > 0.0 && spread_width > 0.0) {
            return Err(StrikeError::InvalidInput(format!("{:?}", self.params)));
        }

        let expected_move = clamp_expected_move(spot, request.expected_move);
        let floor_distance = sd_multiplier * expected_move;
        let mut notes = Vec::new();

        let (put_short, call_short, source) = self
            .advisor_tier(request, floor_distance, &mut notes)
            .map(|(p, c)| (p, c, StrikeSource::Advisor))
            .or_else(|| {
                self.gex_tier(request, floor_distance, &mut notes)
                    .map(|(p, c)| (p, c, StrikeSource::Gex))
            })
            .unwrap_or_else(|| {
                let (p, c) = self.sd_tier(spot, floor_distance);
                (p, c, StrikeSource::Sd(sd_multiplier))
            });

        let strikes = match StrikeSet::new(spot, put_short, call_short, spread_width, source) {
            Ok(set) => set,
            Err(violation) => {
                tracing::error!(
                    spot,
                    put_short,
                    call_short,
                    source = %source,
                    error = %violation,
                    "Strike invariant violated, using emergency fallback"
                );
                notes.push(format!("{source} strikes invalid ({violation}), emergency fallback"));
                let distance = (EMERGENCY_DISTANCE_PCT * spot).max(floor_distance);
                StrikeSet::new(
                    spot,
                    self.round_put(spot - distance),
                    self.round_call(spot + distance),
                    spread_width,
                    StrikeSource::Emergency,
                )?
            }
        };

        Ok(StrikeSelection {
            strikes,
            expected_move,
            floor_distance,
            notes,
        })
    }

    fn advisor_tier(
        &self,
        request: &StrikeRequest,
        floor_distance: f64,
        notes: &mut Vec<String>,
    ) -> Option<(f64, f64)> {
        let spot = request.spot;
        let (put, call) = match (request.advisor_put, request.advisor_call) {
            (Some(put), Some(call)) => (put, call),
            (None, None) => return None,
            _ => {
                notes.push("advisor suggested only one side, ignored".to_string());
                return None;
            }
        };

        let in_band = |distance: f64| {
            let pct = distance / spot;
            (ADVISOR_MIN_DISTANCE_PCT..=ADVISOR_MAX_DISTANCE_PCT).contains(&pct)
        };
        if !(in_band(spot - put) && in_band(call - spot)) {
            notes.push(format!(
                "advisor strikes {put}/{call} outside {:.1}%-{:.1}% of spot",
                ADVISOR_MIN_DISTANCE_PCT * 100.0,
                ADVISOR_MAX_DISTANCE_PCT * 100.0
            ));
            return None;
        }

        self.floor_checked("advisor", put, call, spot, floor_distance, notes)
    }

    fn gex_tier(
        &self,
        request: &StrikeRequest,
        floor_distance: f64,
        notes: &mut Vec<String>,
    ) -> Option<(f64, f64)> {
        let spot = request.spot;
        let (put_wall, call_wall) = (request.put_wall?, request.call_wall?);
        if !(put_wall < spot && spot < call_wall) {
            notes.push(format!(
                "GEX walls {put_wall}/{call_wall} do not bracket spot {spot}"
            ));
            return None;
        }
        self.floor_checked("GEX", put_wall, call_wall, spot, floor_distance, notes)
    }

    fn sd_tier(&self, spot: f64, floor_distance: f64) -> (f64, f64) {
        (
            self.round_put(spot - floor_distance),
            self.round_call(spot + floor_distance),
        )
    }

    /// Rounds a candidate pair and accepts it only if both sides clear the floor.
    fn floor_checked(
        &self,
        tier: &str,
        put: f64,
        call: f64,
        spot: f64,
        floor_distance: f64,
        notes: &mut Vec<String>,
    ) -> Option<(f64, f64)> {
        let put = self.round_put(put);
        let call = self.round_call(call);
        let clears = |distance: f64| distance + ROUNDING_EPSILON >= floor_distance;

        if clears(spot - put) && clears(call - spot) {
            return Some((put, call));
        }

        let em = floor_distance / self.params.sd_multiplier;
        notes.push(format!(
            "{tier} strikes {put}/{call} inside {:.2} SD floor (put {:.2} SD, call {:.2} SD)",
            self.params.sd_multiplier,
            (spot - put) / em,
            (call - spot) / em
        ));
        tracing::debug!(tier, put, call, floor_distance, "Strike tier rejected by SD floor");
        None
    }
}

/// Clamps an expected move to `[0.5%, 5%]` of spot; non-finite input takes the lower bound.
#[must_use]
pub fn clamp_expected_move(spot: f64, expected_move: f64) -> f64 {
    let low = MIN_EM_PCT * spot;
    let high = MAX_EM_PCT * spot;
    if expected_move.is_finite() {
        expected_move.clamp(low, high)
    } else {
        low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expected_move::expected_move;

    fn fortress() -> StrikeSelector {
        StrikeSelector::new(StrikeParams::from(&BotConfig::fortress()))
    }

    fn pegasus() -> StrikeSelector {
        StrikeSelector::new(StrikeParams::from(&BotConfig::pegasus()))
    }

    // ============================================
    // Tier selection
    // ============================================

    #[test]
    fn tight_walls_fall_back_to_sd() {
        let em = expected_move(600.0, 15.0);
        let request = StrikeRequest::new(600.0, em).with_walls(Some(597.0), Some(603.0));
        let selection = fortress().select(&request).unwrap();

        assert_eq!(selection.strikes.source(), StrikeSource::Sd(1.2));
        assert_eq!(selection.strikes.put_short(), 593.0);
        assert_eq!(selection.strikes.call_short(), 607.0);
        assert!(!selection.strikes.using_gex());
        assert!(selection.notes.iter().any(|n| n.contains("GEX")));
    }

    #[test]
    fn wide_walls_are_used() {
        let em = expected_move(600.0, 15.0);
        let request = StrikeRequest::new(600.0, em).with_walls(Some(592.02), Some(607.98));
        let selection = fortress().select(&request).unwrap();

        assert!(selection.strikes.using_gex());
        assert_eq!(selection.strikes.put_short(), 592.0);
        assert_eq!(selection.strikes.call_short(), 608.0);
    }

    #[test]
    fn advisor_strikes_take_priority_over_walls() {
        let em = expected_move(600.0, 15.0);
        let request = StrikeRequest::new(600.0, em)
            .with_walls(Some(592.0), Some(608.0))
            .with_advisor_strikes(Some(590.0), Some(610.0));
        let selection = fortress().select(&request).unwrap();

        assert_eq!(selection.strikes.source(), StrikeSource::Advisor);
        assert_eq!(selection.strikes.put_short(), 590.0);
        assert_eq!(selection.strikes.call_short(), 610.0);
    }

    #[test]
    fn advisor_strikes_inside_floor_are_rejected() {
        // 0.8% from spot clears the band but not a 1.2 SD floor at VIX 15.
        let em = expected_move(600.0, 15.0);
        let request = StrikeRequest::new(600.0, em)
            .with_walls(Some(592.0), Some(608.0))
            .with_advisor_strikes(Some(595.2), Some(604.8));
        let selection = fortress().select(&request).unwrap();
        assert_eq!(selection.strikes.source(), StrikeSource::Gex);
        assert!(selection.notes[0].contains("advisor"));
    }

    #[test]
    fn advisor_strikes_outside_band_are_rejected() {
        let em = expected_move(600.0, 15.0);
        let request =
            StrikeRequest::new(600.0, em).with_advisor_strikes(Some(560.0), Some(640.0));
        let selection = fortress().select(&request).unwrap();
        assert_eq!(selection.strikes.source(), StrikeSource::Sd(1.2));
    }

    #[test]
    fn one_sided_advisor_suggestion_is_ignored() {
        let em = expected_move(600.0, 15.0);
        let request = StrikeRequest::new(600.0, em).with_advisor_strikes(Some(590.0), None);
        let selection = fortress().select(&request).unwrap();
        assert_eq!(selection.strikes.source(), StrikeSource::Sd(1.2));
    }

    #[test]
    fn inverted_walls_are_rejected() {
        let em = expected_move(600.0, 15.0);
        let request = StrikeRequest::new(600.0, em).with_walls(Some(610.0), Some(590.0));
        let selection = fortress().select(&request).unwrap();
        assert_eq!(selection.strikes.source(), StrikeSource::Sd(1.2));
    }

    #[test]
    fn one_missing_wall_skips_gex_tier() {
        let em = expected_move(600.0, 15.0);
        let request = StrikeRequest::new(600.0, em).with_walls(Some(590.0), None);
        let selection = fortress().select(&request).unwrap();
        assert_eq!(selection.strikes.source(), StrikeSource::Sd(1.2));
    }

    // ============================================
    // Rounding and clamping
    // ============================================

    #[test]
    fn rounding_moves_away_from_spot() {
        let sel = pegasus();
        assert_eq!(sel.round_put(5793.0), 5790.0);
        assert_eq!(sel.round_call(5807.0), 5810.0);
        assert_eq!(sel.round_put(5790.0), 5790.0);
        assert_eq!(sel.round_call(5810.0), 5810.0);
    }

    #[test]
    fn spx_strikes_land_on_five_dollar_increments() {
        let em = expected_move(5812.0, 18.0);
        let selection = pegasus().select(&StrikeRequest::new(5812.0, em)).unwrap();
        let set = &selection.strikes;
        assert_eq!(set.put_short() % 5.0, 0.0);
        assert_eq!(set.call_short() % 5.0, 0.0);
        assert_eq!(set.put_short() - set.put_long(), 10.0);
        assert_eq!(set.call_long() - set.call_short(), 10.0);
    }

    #[test]
    fn expected_move_is_clamped_to_sane_band() {
        assert!((clamp_expected_move(600.0, 0.1) - 3.0).abs() < 1e-12);
        assert!((clamp_expected_move(600.0, 100.0) - 30.0).abs() < 1e-12);
        assert!((clamp_expected_move(600.0, f64::NAN) - 3.0).abs() < 1e-12);
        assert!((clamp_expected_move(600.0, 5.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_vix_still_respects_minimum_distance() {
        let selection = fortress().select(&StrikeRequest::new(600.0, 0.0)).unwrap();
        // EM clamps to 3.0, floor 3.6: 596.4 -> 596, 603.6 -> 604
        assert_eq!(selection.strikes.put_short(), 596.0);
        assert_eq!(selection.strikes.call_short(), 604.0);
    }

    // ============================================
    // Failure paths
    // ============================================

    #[test]
    fn non_positive_spot_is_invalid_input() {
        let err = fortress().select(&StrikeRequest::new(0.0, 1.0)).unwrap_err();
        assert!(matches!(err, StrikeError::InvalidInput(_)));
    }

    #[test]
    fn invariant_violation_recovers_with_emergency_strikes() {
        // Walls at 1/20 clear the floor but put the long put below zero.
        let spot = 10.0;
        let em = expected_move(spot, 15.0);
        let request = StrikeRequest::new(spot, em).with_walls(Some(1.0), Some(20.0));
        let selection = fortress().select(&request).unwrap();
        let set = &selection.strikes;

        assert_eq!(set.source(), StrikeSource::Emergency);
        assert_eq!(set.describe(), "7/9P-11/13C");
        assert!(set.put_long() < set.put_short());
        assert!(set.put_short() < spot && spot < set.call_short());
        assert!(set.call_short() < set.call_long());
        assert!(spot - set.put_short() + 1e-9 >= selection.floor_distance);
        assert!(set.call_short() - spot + 1e-9 >= selection.floor_distance);
        assert!(selection.notes.iter().any(|n| n.contains("emergency fallback")));
    }

    #[test]
    fn tiny_underlying_cannot_build_a_condor() {
        // Long put would be negative for a $2 wide spread on a $1 stock.
        let err = fortress().select(&StrikeRequest::new(1.0, 0.01)).unwrap_err();
        assert!(matches!(err, StrikeError::Unrecoverable(_)));
    }

    // ============================================
    // Invariants
    // ============================================

    #[test]
    fn every_tier_respects_the_sd_floor() {
        let sel = fortress();
        for vix in [10.0, 15.0, 22.0, 35.0, 60.0] {
            for wall_pct in [0.002, 0.005, 0.0133, 0.02, 0.04] {
                for advisor_pct in [None, Some(0.006), Some(0.012), Some(0.03)] {
                    let spot = 600.0;
                    let em = expected_move(spot, vix);
                    let request = StrikeRequest::new(spot, em)
                        .with_walls(Some(spot * (1.0 - wall_pct)), Some(spot * (1.0 + wall_pct)))
                        .with_advisor_strikes(
                            advisor_pct.map(|p: f64| spot * (1.0 - p)),
                            advisor_pct.map(|p: f64| spot * (1.0 + p)),
                        );
                    let selection = sel.select(&request).unwrap();
                    let set = &selection.strikes;
                    let (put_sd, call_sd) = set.sd_distances(spot, selection.expected_move);

                    assert!(put_sd >= 1.2 - 1e-9, "put {put_sd} SD at vix {vix}");
                    assert!(call_sd >= 1.2 - 1e-9, "call {call_sd} SD at vix {vix}");
                    assert!(set.put_long() < set.put_short());
                    assert!(set.put_short() < spot && spot < set.call_short());
                    assert!(set.call_short() < set.call_long());
                    assert_eq!(set.call_long() - set.call_short(), 2.0);
                    assert_eq!(set.put_short() - set.put_long(), 2.0);
                }
            }
        }
    }
}
