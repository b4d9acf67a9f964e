//! Database repositories for the iron condor engine.

pub mod ic_signal_repo;

pub use ic_signal_repo::{IcSignalRepository, SourceCount};
