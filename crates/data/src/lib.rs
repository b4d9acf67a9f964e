//! Signal persistence for the iron condor engine.
//!
//! This crate provides:
//! - `PostgreSQL` pool setup with embedded migrations
//! - The `ic_signals` row model and repository
//! - An in-memory [`SignalStore`](condor_core::SignalStore) for dry runs

pub mod database;
pub mod memory;
pub mod models;
pub mod repositories;

pub use database::{connect, connect_configured};
pub use memory::MemorySignalStore;
pub use models::IcSignalRecord;
pub use repositories::{IcSignalRepository, SourceCount};
