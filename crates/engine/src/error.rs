use condor_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrikeError {
    #[error("Invalid strike selection input: {0}")]
    InvalidInput(String),

    #[error("Strike invariant violated after emergency fallback: {0}")]
    Unrecoverable(#[from] CoreError),
}
