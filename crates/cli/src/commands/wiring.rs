//! Builds collaborators and generators from the loaded configuration.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use condor_clients::{
    GexClient, GexClientConfig, HttpAdvisor, HttpAdvisorConfig, TradierClient,
    TradierClientConfig,
};
use condor_core::{AdvisorEndpoint, AdvisorKind, AppConfig, BotConfig, ConfigLoader, SignalStore};
use condor_data::{IcSignalRepository, MemorySignalStore};
use condor_engine::{Collaborators, SignalGenerator};

/// Configuration file selection shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Profile overlay loaded from `Config.{profile}.toml` next to the config file
    #[arg(long, env = "CONDOR_PROFILE")]
    pub profile: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<AppConfig> {
        let loaded = match &self.profile {
            Some(profile) => ConfigLoader::load_from_with_profile(&self.config, profile),
            None => ConfigLoader::load_from(&self.config),
        };
        loaded.with_context(|| format!("loading configuration from {}", self.config))
    }
}

/// Looks up a bot by name in the config, falling back to the built-in presets.
pub fn resolve_bot(config: &AppConfig, name: &str) -> Result<BotConfig> {
    config.bot(name).ok_or_else(|| {
        let known: Vec<_> = config.bots.keys().map(String::as_str).collect();
        anyhow!("unknown bot '{name}' (configured: {})", known.join(", "))
    })
}

/// Remote collaborators shared by every generator in the process.
pub struct Wiring {
    tradier: Arc<TradierClient>,
    gex: Option<Arc<GexClient>>,
    ml_advisor: Option<Arc<HttpAdvisor>>,
    oracle: Option<Arc<HttpAdvisor>>,
    store: Arc<dyn SignalStore>,
}

impl Wiring {
    /// Connects to Tradier, GEX, the advisors, and the signal store.
    ///
    /// `dry_run` keeps signals in memory even when a database is configured.
    pub async fn connect(config: &AppConfig, dry_run: bool) -> Result<Self> {
        let tradier_config = TradierClientConfig::try_from(&config.tradier)?;
        let tradier = Arc::new(
            TradierClient::from_env(tradier_config).context("building Tradier client")?,
        );

        let gex = match GexClientConfig::from_settings(&config.gex) {
            Some(gex_config) => Some(Arc::new(GexClient::new(&gex_config)?)),
            None => {
                tracing::warn!("No GEX service configured; GEX-dependent bots will block");
                None
            }
        };

        let ml_advisor = advisor(config.advisors.ml.as_ref(), AdvisorKind::Ml)?;
        let oracle = advisor(config.advisors.oracle.as_ref(), AdvisorKind::Oracle)?;

        let store: Arc<dyn SignalStore> = if dry_run {
            tracing::info!("Dry run: signals kept in memory");
            Arc::new(MemorySignalStore::new())
        } else {
            match condor_data::connect_configured(&config.database).await? {
                Some(pool) => Arc::new(IcSignalRepository::new(pool)),
                None => {
                    tracing::warn!("No database configured; signals kept in memory");
                    Arc::new(MemorySignalStore::new())
                }
            }
        };

        Ok(Self {
            tradier,
            gex,
            ml_advisor,
            oracle,
            store,
        })
    }

    /// Builds a generator for `bot` over the shared collaborators.
    pub fn generator(&self, bot: BotConfig) -> Result<SignalGenerator> {
        let mut collaborators = Collaborators::new(self.tradier.clone())
            .with_quotes(self.tradier.clone())
            .with_store(self.store.clone());
        if let Some(gex) = &self.gex {
            collaborators = collaborators.with_gex(gex.clone());
        }
        if let Some(ml) = &self.ml_advisor {
            collaborators = collaborators.with_ml_advisor(ml.clone());
        }
        if let Some(oracle) = &self.oracle {
            collaborators = collaborators.with_backup_advisor(oracle.clone());
        }

        let name = bot.name.clone();
        SignalGenerator::new(bot, collaborators)
            .with_context(|| format!("invalid configuration for bot {name}"))
    }
}

fn advisor(endpoint: Option<&AdvisorEndpoint>, kind: AdvisorKind) -> Result<Option<Arc<HttpAdvisor>>> {
    let Some(endpoint) = endpoint else {
        return Ok(None);
    };
    let config = HttpAdvisorConfig::from_endpoint(endpoint, kind).with_api_key_from_env();
    let client = HttpAdvisor::new(config)
        .with_context(|| format!("building {kind} advisor '{}'", endpoint.name))?;
    Ok(Some(Arc::new(client)))
}
