//! Iron condor strike selection and signal arbitration.
//!
//! [`SignalGenerator`] drives one scan per call: market snapshot, advisor
//! arbitration, strike selection, credit estimation. The pieces it composes
//! are usable on their own.

pub mod arbiter;
pub mod calendar;
pub mod capabilities;
pub mod credit;
pub mod direction;
pub mod error;
pub mod expected_move;
pub mod generator;
pub mod iv_solver;
pub mod strikes;

pub use arbiter::{
    normalize, AdvisorPolicy, ArbiterState, Arbitration, PolicyOutcome, PredictionArbiter,
    MAX_CONFIDENCE,
};
pub use capabilities::Capabilities;
pub use credit::{formula_credits, CreditEstimate, CreditEstimator, LegQuotes};
pub use direction::{resolve_direction, DirectionBasis};
pub use error::StrikeError;
pub use expected_move::expected_move;
pub use generator::{Collaborators, SignalGenerator};
pub use iv_solver::{BlackScholes, IvResult, IvSolver, SolveMethod, SolverConfig, SolverStats};
pub use strikes::{StrikeParams, StrikeRequest, StrikeSelection, StrikeSelector};
