//! Database row models.

mod ic_signal;

pub use ic_signal::IcSignalRecord;
