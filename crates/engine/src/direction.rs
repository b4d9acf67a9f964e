//! Directional bias for directional-spread bots.

use condor_core::{Direction, MarketSnapshot, Prediction};
use serde::Serialize;

/// Which rule produced a resolved direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionBasis {
    Advisor,
    Suitability,
    WallProximity,
    Default,
}

impl std::fmt::Display for DirectionBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Advisor => write!(f, "advisor"),
            Self::Suitability => write!(f, "suitability scores"),
            Self::WallProximity => write!(f, "GEX wall proximity"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Resolves direction in order: the advisor's own direction, its suitability
/// scores, proximity to the GEX walls, then `default`.
///
/// Spot nearer the put wall (support) reads bullish; nearer the call wall
/// (resistance) reads bearish. Ties fall through to the next rule.
#[must_use]
pub fn resolve_direction(
    prediction: Option<&Prediction>,
    snapshot: &MarketSnapshot,
    default: Direction,
) -> (Direction, DirectionBasis) {
    if let Some(direction) = prediction
        .and_then(|p| p.direction)
        .filter(|d| d.is_directional())
    {
        return (direction, DirectionBasis::Advisor);
    }

    if let Some(scores) = prediction.and_then(|p| p.suitability) {
        if scores.bullish > scores.bearish {
            return (Direction::Bullish, DirectionBasis::Suitability);
        }
        if scores.bearish > scores.bullish {
            return (Direction::Bearish, DirectionBasis::Suitability);
        }
    }

    if let (Some(put), Some(call)) = (
        snapshot.put_wall_distance_pct(),
        snapshot.call_wall_distance_pct(),
    ) {
        if put >= 0.0 && call >= 0.0 {
            if put < call {
                return (Direction::Bullish, DirectionBasis::WallProximity);
            }
            if call < put {
                return (Direction::Bearish, DirectionBasis::WallProximity);
            }
        }
    }

    (default, DirectionBasis::Default)
}
