//! CLI commands for the iron condor engine.

pub mod history;
pub mod inspect;
pub mod scan;
pub mod wiring;

pub use history::{run_history, HistoryArgs};
pub use inspect::{run_solve_iv, run_strikes, SolveIvArgs, StrikesArgs};
pub use scan::{run_scan, run_scheduler, RunArgs, ScanArgs};
