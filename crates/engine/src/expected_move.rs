/// Trading days per year used to de-annualise VIX.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One-standard-deviation daily move implied by a VIX level.
///
/// `spot * (vix / 100) / sqrt(252)`. No sanity floor is applied here; the
/// strike selector clamps the result before using it.
#[must_use]
pub fn expected_move(spot: f64, vix: f64) -> f64 {
    spot * (vix / 100.0) / TRADING_DAYS_PER_YEAR.sqrt()
}
