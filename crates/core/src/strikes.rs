//! Iron condor strike sets.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Which selection tier produced a [`StrikeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", content = "sd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrikeSource {
    /// Strikes suggested by the winning advisor.
    Advisor,
    /// GEX call/put walls.
    Gex,
    /// Pure expected-move fallback at the given SD multiplier.
    Sd(f64),
    /// Last-resort recomputation after an invariant violation.
    Emergency,
}

impl StrikeSource {
    /// Audit tag: `ADVISOR`, `GEX`, `SD_x.x` or `EMERGENCY`.
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::Advisor => "ADVISOR".to_string(),
            Self::Gex => "GEX".to_string(),
            Self::Sd(m) => format!("SD_{m:.1}"),
            Self::Emergency => "EMERGENCY".to_string(),
        }
    }
}

impl std::fmt::Display for StrikeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Four iron condor strikes.
///
/// Invariant: `put_long < put_short < spot < call_short < call_long` and both
/// wings are `spread_width` wide. Only constructible through [`StrikeSet::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeSet {
    put_long: f64,
    put_short: f64,
    call_short: f64,
    call_long: f64,
    spread_width: f64,
    source: StrikeSource,
}

impl StrikeSet {
    /// Builds a strike set from the two short strikes, checking the ordering
    /// invariant against `spot`.
    ///
    /// # Errors
    /// Returns [`CoreError::StrikeInvariant`] if any leg is non-positive, the
    /// wings overlap, or spot is not strictly inside the short strikes.
    pub fn new(
        spot: f64,
        put_short: f64,
        call_short: f64,
        spread_width: f64,
        source: StrikeSource,
    ) -> Result<Self, CoreError> {
        let put_long = put_short - spread_width;
        let call_long = call_short + spread_width;

        let finite = [spot, put_short, call_short, spread_width]
            .iter()
            .all(|v| v.is_finite());
        if !finite || spread_width <= 0.0 {
            return Err(CoreError::StrikeInvariant(format!(
                "non-finite input or width {spread_width}"
            )));
        }
        if put_long <= 0.0 {
            return Err(CoreError::StrikeInvariant(format!(
                "put long {put_long} is not positive"
            )));
        }
        if !(put_long < put_short && put_short < spot && spot < call_short && call_short < call_long)
        {
            return Err(CoreError::StrikeInvariant(format!(
                "ordering violated: {put_long}/{put_short} | {spot} | {call_short}/{call_long}"
            )));
        }

        Ok(Self {
            put_long,
            put_short,
            call_short,
            call_long,
            spread_width,
            source,
        })
    }

    #[must_use]
    pub fn put_long(&self) -> f64 {
        self.put_long
    }

    #[must_use]
    pub fn put_short(&self) -> f64 {
        self.put_short
    }

    #[must_use]
    pub fn call_short(&self) -> f64 {
        self.call_short
    }

    #[must_use]
    pub fn call_long(&self) -> f64 {
        self.call_long
    }

    #[must_use]
    pub fn spread_width(&self) -> f64 {
        self.spread_width
    }

    #[must_use]
    pub fn source(&self) -> StrikeSource {
        self.source
    }

    /// True if the source tier was the GEX walls.
    #[must_use]
    pub fn using_gex(&self) -> bool {
        matches!(self.source, StrikeSource::Gex)
    }

    /// Distance of each short strike from spot in expected-move units
    /// `(put_sd, call_sd)`.
    #[must_use]
    pub fn sd_distances(&self, spot: f64, expected_move: f64) -> (f64, f64) {
        if expected_move <= 0.0 {
            return (0.0, 0.0);
        }
        (
            (spot - self.put_short) / expected_move,
            (self.call_short - spot) / expected_move,
        )
    }

    /// Compact `590/592P-608/610C` rendering for reasoning strings.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{}/{}P-{}/{}C",
            self.put_long, self.put_short, self.call_short, self.call_long
        )
    }
}
