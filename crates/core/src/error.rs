//! Error types shared across the workspace.

use thiserror::Error;

/// Errors raised by core types and configuration validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid config for {bot}: {reason}")]
    InvalidConfig {
        /// Bot whose config failed validation.
        bot: String,
        /// What was wrong.
        reason: String,
    },

    /// A strike set violated `put_long < put_short < spot < call_short < call_long`.
    #[error("strike invariant violated: {0}")]
    StrikeInvariant(String),

    /// A numeric input was non-finite or outside its domain.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Creates an invalid-config error.
    pub fn invalid_config(bot: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            bot: bot.into(),
            reason: reason.into(),
        }
    }
}
