use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::prediction::Direction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tradier: TradierConfig,
    #[serde(default)]
    pub gex: GexConfig,
    #[serde(default)]
    pub advisors: AdvisorsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default = "default_bots")]
    pub bots: BTreeMap<String, BotConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradierConfig {
    pub api_url: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
    /// Symbol queried for the volatility index.
    pub vix_symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GexConfig {
    /// Base URL of the GEX service; `None` disables the GEX provider.
    pub api_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorsConfig {
    pub ml: Option<AdvisorEndpoint>,
    pub oracle: Option<AdvisorEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorEndpoint {
    pub name: String,
    pub url: String,
    #[serde(default = "default_advisor_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; `None` keeps signals in memory only.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    /// Skip scans outside 09:30-16:00 America/New_York on weekdays.
    pub market_hours_only: bool,
}

/// Which kind of position a bot opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    IronCondor,
    Directional,
}

/// Per-bot trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    pub ticker: String,
    /// OCC root for option symbols (e.g. `SPXW` for SPX weeklies).
    pub option_root: String,
    pub strategy: StrategyKind,
    /// Minimum short-strike distance in expected-move units (MIN_SD).
    pub sd_multiplier: f64,
    pub strike_increment: f64,
    pub spread_width: f64,
    pub contracts: u32,
    /// Days to expiration of the traded contracts (0 = same day).
    pub dte: u32,
    /// Only gates trades when no advisor is authoritative.
    pub min_win_probability: f64,
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    #[serde(default = "default_max_vix")]
    pub max_vix: f64,
    #[serde(default = "default_true")]
    pub require_gex: bool,
    #[serde(default)]
    pub trade_without_advisor: bool,
    #[serde(default = "default_win_probability")]
    pub default_win_probability: f64,
    #[serde(default = "default_reduced_size_multiplier")]
    pub reduced_size_multiplier: f64,
    #[serde(default = "default_direction")]
    pub default_direction: Direction,
    /// Query the backup advisor even when the primary answered, for audit.
    #[serde(default = "default_true")]
    pub consult_backup_for_audit: bool,
}

/// Longest supported days-to-expiration.
pub const MAX_DTE: u32 = 366;

impl BotConfig {
    /// FORTRESS: SPY 0DTE iron condor, $1 strikes, $2 wings, 1.2 SD floor.
    #[must_use]
    pub fn fortress() -> Self {
        Self {
            name: "FORTRESS".to_string(),
            ticker: "SPY".to_string(),
            option_root: "SPY".to_string(),
            strategy: StrategyKind::IronCondor,
            sd_multiplier: 1.2,
            strike_increment: 1.0,
            spread_width: 2.0,
            contracts: 10,
            dte: 0,
            min_win_probability: 0.55,
            staleness_secs: default_staleness_secs(),
            max_vix: default_max_vix(),
            require_gex: true,
            trade_without_advisor: false,
            default_win_probability: default_win_probability(),
            reduced_size_multiplier: default_reduced_size_multiplier(),
            default_direction: Direction::Neutral,
            consult_backup_for_audit: true,
        }
    }

    /// PEGASUS: SPX 0DTE iron condor, $5 strikes, $10 wings, 1.0 SD floor.
    #[must_use]
    pub fn pegasus() -> Self {
        Self {
            name: "PEGASUS".to_string(),
            ticker: "SPX".to_string(),
            option_root: "SPXW".to_string(),
            sd_multiplier: 1.0,
            strike_increment: 5.0,
            spread_width: 10.0,
            contracts: 2,
            ..Self::fortress()
        }
    }

    /// SAMSON: aggressive SPX iron condor at a 0.8 SD floor.
    #[must_use]
    pub fn samson() -> Self {
        Self {
            name: "SAMSON".to_string(),
            sd_multiplier: 0.8,
            contracts: 1,
            min_win_probability: 0.60,
            ..Self::pegasus()
        }
    }

    /// SOLOMON: SPY directional spreads.
    #[must_use]
    pub fn solomon() -> Self {
        Self {
            name: "SOLOMON".to_string(),
            strategy: StrategyKind::Directional,
            contracts: 5,
            default_direction: Direction::Bullish,
            ..Self::fortress()
        }
    }

    /// Built-in preset by case-insensitive name.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fortress" => Some(Self::fortress()),
            "pegasus" => Some(Self::pegasus()),
            "samson" => Some(Self::samson()),
            "solomon" => Some(Self::solomon()),
            _ => None,
        }
    }

    /// Checks every numeric parameter against its domain.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |reason: &str| Err(CoreError::invalid_config(&self.name, reason));

        if self.ticker.trim().is_empty() || self.option_root.trim().is_empty() {
            return fail("ticker and option_root must be set");
        }
        if !(self.sd_multiplier.is_finite() && self.sd_multiplier > 0.0) {
            return fail("sd_multiplier must be > 0");
        }
        if !(self.strike_increment.is_finite() && self.strike_increment > 0.0) {
            return fail("strike_increment must be > 0");
        }
        if !(self.spread_width.is_finite() && self.spread_width > 0.0) {
            return fail("spread_width must be > 0");
        }
        if self.contracts == 0 {
            return fail("contracts must be >= 1");
        }
        if self.dte > MAX_DTE {
            return fail(&format!("dte must be <= {MAX_DTE}"));
        }
        if !(0.0..=1.0).contains(&self.min_win_probability) {
            return fail("min_win_probability must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.default_win_probability) {
            return fail("default_win_probability must be in [0, 1]");
        }
        if !(self.reduced_size_multiplier > 0.0 && self.reduced_size_multiplier <= 1.0) {
            return fail("reduced_size_multiplier must be in (0, 1]");
        }
        if !(self.max_vix.is_finite() && self.max_vix > 0.0) {
            return fail("max_vix must be > 0");
        }
        Ok(())
    }
}

impl AppConfig {
    /// Looks up a bot by case-insensitive name, falling back to the built-in preset.
    #[must_use]
    pub fn bot(&self, name: &str) -> Option<BotConfig> {
        self.bots
            .iter()
            .find(|(key, cfg)| key.eq_ignore_ascii_case(name) || cfg.name.eq_ignore_ascii_case(name))
            .map(|(_, cfg)| cfg.clone())
            .or_else(|| BotConfig::preset(name))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tradier: TradierConfig::default(),
            gex: GexConfig::default(),
            advisors: AdvisorsConfig::default(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            bots: default_bots(),
        }
    }
}

impl Default for TradierConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.tradier.com/v1".to_string(),
            requests_per_minute: 120,
            timeout_secs: 10,
            vix_symbol: "VIX".to_string(),
        }
    }
}

impl Default for GexConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: 10,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            market_hours_only: true,
        }
    }
}

fn default_bots() -> BTreeMap<String, BotConfig> {
    [
        BotConfig::fortress(),
        BotConfig::pegasus(),
        BotConfig::samson(),
        BotConfig::solomon(),
    ]
    .into_iter()
    .map(|cfg| (cfg.name.to_ascii_lowercase(), cfg))
    .collect()
}

const fn default_staleness_secs() -> u64 {
    120
}

const fn default_max_vix() -> f64 {
    50.0
}

const fn default_true() -> bool {
    true
}

const fn default_win_probability() -> f64 {
    0.60
}

const fn default_reduced_size_multiplier() -> f64 {
    0.5
}

const fn default_direction() -> Direction {
    Direction::Neutral
}

const fn default_advisor_timeout() -> u64 {
    5
}

const fn default_max_connections() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for preset in ["fortress", "pegasus", "samson", "solomon"] {
            let cfg = BotConfig::preset(preset).unwrap();
            assert!(cfg.validate().is_ok(), "{preset} failed validation");
        }
    }

    #[test]
    fn pegasus_uses_spx_weeklies() {
        let cfg = BotConfig::pegasus();
        assert_eq!(cfg.ticker, "SPX");
        assert_eq!(cfg.option_root, "SPXW");
        assert!((cfg.strike_increment - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_zero_sd_multiplier() {
        let cfg = BotConfig {
            sd_multiplier: 0.0,
            ..BotConfig::fortress()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("sd_multiplier"));
    }

    #[test]
    fn validate_rejects_zero_contracts() {
        let cfg = BotConfig {
            contracts: 0,
            ..BotConfig::fortress()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_dte_beyond_a_year() {
        let cfg = BotConfig {
            dte: u32::MAX,
            ..BotConfig::fortress()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("dte"));

        let cfg = BotConfig {
            dte: MAX_DTE,
            ..BotConfig::fortress()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn app_config_bot_lookup_falls_back_to_preset() {
        let config = AppConfig {
            bots: BTreeMap::new(),
            ..AppConfig::default()
        };
        let bot = config.bot("Samson").unwrap();
        assert_eq!(bot.name, "SAMSON");
        assert!(config.bot("unknown").is_none());
    }
}
