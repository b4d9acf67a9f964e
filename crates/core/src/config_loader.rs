use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging built-in defaults, `config/Config.toml`,
    /// and `CONDOR_`-prefixed environment variables (`__` separates nested keys).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Same as [`ConfigLoader::load`] with an explicit TOML path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a bot config is invalid.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::figment(path).extract()?;
        Self::validate(&config)?;
        tracing::debug!(path, bots = config.bots.len(), "Configuration loaded");
        Ok(config)
    }

    /// Loads configuration with a profile overlay (`config/Config.{profile}.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::load_from_with_profile("config/Config.toml", profile)
    }

    /// Loads `path`, then `Config.{profile}.toml` from the same directory,
    /// then the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from_with_profile(path: &str, profile: &str) -> Result<AppConfig> {
        let overlay = std::path::Path::new(path).with_file_name(format!("Config.{profile}.toml"));
        let config: AppConfig = Self::figment(path)
            .merge(Toml::file(overlay))
            .merge(Env::prefixed("CONDOR_").split("__"))
            .extract()?;
        Self::validate(&config)?;
        tracing::debug!(path, profile, bots = config.bots.len(), "Configuration loaded");
        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CONDOR_").split("__"))
    }

    fn validate(config: &AppConfig) -> Result<()> {
        for bot in config.bots.values() {
            bot.validate()?;
        }
        Ok(())
    }
}
