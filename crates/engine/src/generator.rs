//! Scan orchestration: snapshot, arbitration, strikes, pricing, signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use condor_core::{
    Advice, Advisor, AdvisorFeatures, BotConfig, CoreError, Direction, GexData, GexProvider,
    GexRegime, LegIv, MarketDataProvider, MarketSnapshot, OptionRight, Pricing, QuoteService,
    Signal, SignalSource, SignalStore, StrategyKind, StrikeSet,
};
use tracing::{error, info, warn};

use crate::arbiter::{ArbiterState, Arbitration, PredictionArbiter};
use crate::calendar::{expiration_date, years_to_expiry};
use crate::capabilities::Capabilities;
use crate::credit::{CreditEstimator, LegQuotes};
use crate::direction::resolve_direction;
use crate::expected_move::expected_move;
use crate::iv_solver::{IvSolver, SolverConfig, SolverStats};
use crate::strikes::{StrikeParams, StrikeRequest, StrikeSelector};

/// Collaborators injected into a [`SignalGenerator`]. Only market data is required.
#[derive(Clone)]
pub struct Collaborators {
    pub market_data: Arc<dyn MarketDataProvider>,
    pub gex: Option<Arc<dyn GexProvider>>,
    pub quotes: Option<Arc<dyn QuoteService>>,
    pub ml_advisor: Option<Arc<dyn Advisor>>,
    pub backup_advisor: Option<Arc<dyn Advisor>>,
    pub store: Option<Arc<dyn SignalStore>>,
}

impl Collaborators {
    #[must_use]
    pub fn new(market_data: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            market_data,
            gex: None,
            quotes: None,
            ml_advisor: None,
            backup_advisor: None,
            store: None,
        }
    }

    #[must_use]
    pub fn with_gex(mut self, gex: Arc<dyn GexProvider>) -> Self {
        self.gex = Some(gex);
        self
    }

    #[must_use]
    pub fn with_quotes(mut self, quotes: Arc<dyn QuoteService>) -> Self {
        self.quotes = Some(quotes);
        self
    }

    #[must_use]
    pub fn with_ml_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.ml_advisor = Some(advisor);
        self
    }

    #[must_use]
    pub fn with_backup_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.backup_advisor = Some(advisor);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SignalStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            ml_advisor: self.ml_advisor.is_some(),
            backup_advisor: self.backup_advisor.is_some(),
            gex: self.gex.is_some(),
            quotes: self.quotes.is_some(),
            persistence: self.store.is_some(),
        }
    }
}

/// State accumulated by one scan, enough to explain any exit path.
struct Scan {
    trail: Vec<String>,
    snapshot: Option<MarketSnapshot>,
    expected_move: Option<f64>,
    arbitration: Option<Arbitration>,
    win_probability: f64,
    confidence: f64,
    direction: Option<Direction>,
}

impl Scan {
    fn new() -> Self {
        Self {
            trail: Vec::new(),
            snapshot: None,
            expected_move: None,
            arbitration: None,
            win_probability: 0.0,
            confidence: 0.0,
            direction: None,
        }
    }

    fn note(&mut self, note: impl Into<String>) {
        self.trail.push(note.into());
    }
}

/// The priced trade attached to a valid signal.
struct Trade {
    strikes: StrikeSet,
    pricing: Pricing,
    leg_ivs: Vec<LegIv>,
}

/// Produces one [`Signal`] per scan for a single bot.
///
/// Owns its solver and arbiter; nothing is shared with other generators.
pub struct SignalGenerator {
    config: BotConfig,
    market_data: Arc<dyn MarketDataProvider>,
    gex: Option<Arc<dyn GexProvider>>,
    store: Option<Arc<dyn SignalStore>>,
    arbiter: PredictionArbiter,
    selector: StrikeSelector,
    credit: CreditEstimator,
    solver: IvSolver,
    capabilities: Capabilities,
}

impl SignalGenerator {
    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: BotConfig, collaborators: Collaborators) -> Result<Self, CoreError> {
        Self::with_solver_config(config, collaborators, SolverConfig::default())
    }

    /// # Errors
    /// Returns [`CoreError::InvalidConfig`] if `config` fails validation.
    pub fn with_solver_config(
        config: BotConfig,
        collaborators: Collaborators,
        solver_config: SolverConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let capabilities = collaborators.capabilities();
        info!(
            bot = %config.name,
            capabilities = %capabilities,
            "Signal generator initialised"
        );

        let Collaborators {
            market_data,
            gex,
            quotes,
            ml_advisor,
            backup_advisor,
            store,
        } = collaborators;

        Ok(Self {
            arbiter: PredictionArbiter::from_advisors(
                ml_advisor,
                backup_advisor,
                config.consult_backup_for_audit,
            ),
            selector: StrikeSelector::new(StrikeParams::from(&config)),
            credit: CreditEstimator::new(quotes, config.option_root.clone()),
            solver: IvSolver::new(solver_config),
            market_data,
            gex,
            store,
            capabilities,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    #[must_use]
    pub fn solver(&self) -> &IvSolver {
        &self.solver
    }

    #[must_use]
    pub fn solver_stats(&self) -> SolverStats {
        self.solver.stats()
    }

    /// Runs one scan and persists the signal. Persistence failures are logged
    /// and do not affect the returned signal.
    pub async fn run_cycle(&self) -> Signal {
        let signal = self.generate().await;
        if let Some(store) = &self.store {
            match store.save(&signal).await {
                Ok(id) => info!(bot = %self.config.name, id, "Signal persisted"),
                Err(e) => error!(
                    bot = %self.config.name,
                    scan_id = %signal.scan_id,
                    error = %e,
                    "Failed to persist signal"
                ),
            }
        }
        signal
    }

    /// Runs one scan. Never fails: every exit path returns a signal whose
    /// `source` and `reasoning` explain the outcome.
    pub async fn generate(&self) -> Signal {
        let cfg = &self.config;
        info!(bot = %cfg.name, ticker = %cfg.ticker, "Scan started");
        let mut scan = Scan::new();

        let snapshot = match self.fresh_snapshot(&mut scan).await {
            Ok(snapshot) => snapshot,
            Err(source) => return self.finish(scan, source, None),
        };
        let spot = snapshot.spot;
        let vix = snapshot.vix;
        let em = expected_move(spot, vix);
        scan.note(format!(
            "spot {spot:.2}, VIX {vix:.2}, EM {em:.2}, GEX {}",
            snapshot.regime
        ));
        let missing = self.capabilities.missing();
        if !missing.is_empty() {
            scan.note(format!("running without {}", missing.join(", ")));
        }
        scan.snapshot = Some(snapshot.clone());
        scan.expected_move = Some(em);

        if vix > cfg.max_vix {
            scan.note(format!("VIX {vix:.2} above ceiling {:.2}", cfg.max_vix));
            return self.finish(scan, SignalSource::BlockedVixTooHigh, None);
        }

        let features = AdvisorFeatures::from_snapshot(&cfg.name, &snapshot, em);
        let arbitration = self.arbiter.arbitrate(&features).await;
        scan.trail.extend(arbitration.notes.iter().cloned());
        let state = arbitration.state;
        let source_kind = arbitration.prediction_source;
        let prediction = arbitration.prediction.clone();
        scan.win_probability = arbitration.win_probability();
        scan.confidence = arbitration.confidence();
        scan.arbitration = Some(arbitration);

        let advice = match (state, &prediction, source_kind) {
            (ArbiterState::ResolvedTrade, Some(p), Some(kind)) => {
                scan.note(format!(
                    "{kind} advises {} (win_p {:.2}, confidence {:.2})",
                    p.advice, p.win_probability, p.confidence
                ));
                p.advice.clone()
            }
            (ArbiterState::ResolvedSkip, Some(p), Some(kind)) => {
                scan.note(format!(
                    "{kind} advises {} (win_p {:.2}){}",
                    p.advice,
                    p.win_probability,
                    if p.reasoning.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", p.reasoning)
                    }
                ));
                return self.finish(scan, SignalSource::BlockedNoTrade(kind), None);
            }
            _ => match self.no_advisor_fallback(&mut scan) {
                Ok(advice) => advice,
                Err(source) => return self.finish(scan, source, None),
            },
        };

        let contracts = self.contracts_for(&advice);
        if contracts != cfg.contracts {
            scan.note(format!("{advice}: size reduced to {contracts} contracts"));
        }

        if cfg.strategy == StrategyKind::Directional {
            let (direction, basis) =
                resolve_direction(prediction.as_ref(), &snapshot, cfg.default_direction);
            scan.note(format!("direction {direction} from {basis}"));
            scan.direction = Some(direction);
        }

        let request = StrikeRequest::new(spot, em)
            .with_walls(snapshot.put_wall, snapshot.call_wall)
            .with_advisor_strikes(
                prediction.as_ref().and_then(|p| p.suggested_put_strike),
                prediction.as_ref().and_then(|p| p.suggested_call_strike),
            );
        let selection = match self.selector.select(&request) {
            Ok(selection) => selection,
            Err(e) => {
                error!(bot = %cfg.name, error = %e, "Strike selection failed");
                scan.note(format!("strike selection failed: {e}"));
                return self.finish(scan, SignalSource::BlockedInvalidStrikes, None);
            }
        };
        scan.trail.extend(selection.notes.iter().cloned());
        let strikes = selection.strikes;
        let (put_sd, call_sd) = strikes.sd_distances(spot, selection.expected_move);
        scan.note(format!(
            "strikes {} via {} (put {put_sd:.2} SD, call {call_sd:.2} SD)",
            strikes.describe(),
            strikes.source()
        ));

        let now = Utc::now();
        let Some(expiration) = expiration_date(now, cfg.dte) else {
            error!(bot = %cfg.name, dte = cfg.dte, "Expiration date out of range");
            scan.note(format!("no expiration date {} days out", cfg.dte));
            return self.finish(scan, SignalSource::BlockedInvalidStrikes, None);
        };
        let estimate = self
            .credit
            .estimate(&strikes, spot, em, vix, expiration, contracts)
            .await;
        if let Some(note) = &estimate.note {
            scan.note(note.clone());
        }
        scan.note(format!(
            "credit ${:.2} ({}), max profit ${}, max loss ${}, expiry {expiration}",
            estimate.pricing.total_credit,
            estimate.pricing.source,
            estimate.pricing.max_profit,
            estimate.pricing.max_loss
        ));

        let leg_ivs = estimate
            .quotes
            .map(|quotes| {
                let years = years_to_expiry(now, expiration);
                self.short_leg_ivs(&strikes, &quotes, spot, years)
            })
            .unwrap_or_default();

        let source = SignalSource::Strikes(strikes.source());
        self.finish(
            scan,
            source,
            Some(Trade {
                strikes,
                pricing: estimate.pricing,
                leg_ivs,
            }),
        )
    }

    /// Fetches a snapshot, refetching once if it is stale.
    async fn fresh_snapshot(&self, scan: &mut Scan) -> Result<MarketSnapshot, SignalSource> {
        let staleness = self.config.staleness_secs;

        let first = self.fetch_snapshot().await.map_err(|reason| {
            scan.note(reason);
            SignalSource::BlockedNoData
        })?;
        if first.is_fresh(Utc::now(), staleness) {
            return Ok(first);
        }

        let age = first.age_secs(Utc::now());
        warn!(bot = %self.config.name, age_secs = age, "Stale snapshot, refetching");
        scan.note(format!("snapshot {age}s old (limit {staleness}s), refetched"));

        let second = self.fetch_snapshot().await.map_err(|reason| {
            scan.note(reason);
            SignalSource::BlockedNoData
        })?;
        if second.is_fresh(Utc::now(), staleness) {
            return Ok(second);
        }

        scan.note(format!(
            "snapshot still {}s old after refetch",
            second.age_secs(Utc::now())
        ));
        scan.snapshot = Some(second);
        Err(SignalSource::BlockedStaleData)
    }

    /// One pass over market data and GEX. `Err` carries the reason data is missing.
    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, String> {
        let ticker = &self.config.ticker;
        let usable = |v: &f64| v.is_finite() && *v > 0.0;

        let spot = match self.market_data.get_spot(ticker).await {
            Ok(spot) => spot.filter(usable),
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Spot request failed");
                None
            }
        };

        let gex = match &self.gex {
            Some(provider) => match provider.get_gex(ticker).await {
                Ok(gex) => gex,
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "GEX request failed");
                    None
                }
            },
            None => None,
        };

        let spot = spot
            .or_else(|| gex.as_ref().and_then(|g| g.spot_price).filter(usable))
            .ok_or_else(|| format!("spot price for {ticker} unavailable"))?;

        let vix = match self.market_data.get_vix().await {
            Ok(vix) => vix.filter(usable),
            Err(e) => {
                warn!(error = %e, "VIX request failed");
                None
            }
        }
        .ok_or_else(|| "VIX unavailable".to_string())?;

        if gex.is_none() && self.config.require_gex {
            return Err(if self.capabilities.gex {
                format!("GEX data for {ticker} unavailable")
            } else {
                "GEX required but no GEX provider configured".to_string()
            });
        }

        Ok(snapshot_from(ticker, spot, vix, gex, Utc::now()))
    }

    /// Handles `RESOLVED_NO_DATA`: block unless advisor-less trading is enabled
    /// and the default probability clears the bot's minimum.
    fn no_advisor_fallback(&self, scan: &mut Scan) -> Result<Advice, SignalSource> {
        let cfg = &self.config;
        if !self.capabilities.has_any_advisor() {
            scan.note("no advisor capability");
        }
        if !cfg.trade_without_advisor {
            scan.note("no advisor prediction and advisor-less trading disabled");
            return Err(SignalSource::BlockedNoPrediction);
        }
        if cfg.default_win_probability < cfg.min_win_probability {
            scan.note(format!(
                "default win probability {:.2} below minimum {:.2}",
                cfg.default_win_probability, cfg.min_win_probability
            ));
            return Err(SignalSource::BlockedBelowThreshold);
        }
        scan.win_probability = cfg.default_win_probability;
        scan.confidence = 0.0;
        scan.note(format!(
            "no advisor prediction, trading on default win probability {:.2}",
            cfg.default_win_probability
        ));
        Ok(Advice::TradeFull)
    }

    fn contracts_for(&self, advice: &Advice) -> u32 {
        let base = self.config.contracts;
        match advice {
            Advice::TradeReduced => {
                let reduced = (f64::from(base) * self.config.reduced_size_multiplier).floor();
                (reduced as u32).max(1)
            }
            _ => base,
        }
    }

    fn short_leg_ivs(
        &self,
        strikes: &StrikeSet,
        quotes: &LegQuotes,
        spot: f64,
        years: f64,
    ) -> Vec<LegIv> {
        [
            (OptionRight::Put, strikes.put_short(), quotes.put_short.mid()),
            (OptionRight::Call, strikes.call_short(), quotes.call_short.mid()),
        ]
        .into_iter()
        .map(|(right, strike, mid)| {
            let result = self.solver.solve(mid, spot, strike, years, right);
            LegIv {
                right,
                strike,
                mid,
                iv: result.iv,
                converged: result.converged,
                confidence: result.confidence,
            }
        })
        .collect()
    }

    fn finish(&self, scan: Scan, source: SignalSource, trade: Option<Trade>) -> Signal {
        let cfg = &self.config;
        let mut signal = Signal::blocked(
            cfg.name.clone(),
            cfg.ticker.clone(),
            source,
            format!("{}: {}", source, scan.trail.join("; ")),
        );

        signal.snapshot = scan.snapshot;
        signal.expected_move = scan.expected_move;
        signal.effective_win_probability = scan.win_probability;
        signal.confidence = scan.confidence;
        signal.direction = scan.direction;
        if let Some(arbitration) = scan.arbitration {
            signal.prediction_source = arbitration.prediction_source;
            signal.advice = arbitration.prediction.map(|p| p.advice);
            signal.ml_prediction = arbitration.ml_prediction;
            signal.backup_prediction = arbitration.backup_prediction;
        }

        match trade {
            Some(trade) if !source.is_blocked() => {
                signal.contracts = trade.pricing.contracts;
                signal.strikes = Some(trade.strikes);
                signal.pricing = Some(trade.pricing);
                signal.leg_ivs = trade.leg_ivs;
                signal.is_valid = true;
                info!(bot = %cfg.name, summary = %signal.summary(), "Scan complete");
            }
            _ => {
                warn!(
                    bot = %cfg.name,
                    source = %source,
                    reason = %signal.reasoning,
                    "Scan blocked"
                );
            }
        }
        signal
    }
}

fn snapshot_from(
    ticker: &str,
    spot: f64,
    vix: f64,
    gex: Option<GexData>,
    now: DateTime<Utc>,
) -> MarketSnapshot {
    match gex {
        Some(g) => MarketSnapshot {
            ticker: ticker.to_string(),
            spot,
            vix,
            regime: g.regime,
            net_gex: g.net_gex,
            call_wall: g.call_wall,
            put_wall: g.put_wall,
            flip_point: g.flip_point,
            timestamp: g.timestamp.unwrap_or(now),
        },
        None => MarketSnapshot {
            ticker: ticker.to_string(),
            spot,
            vix,
            regime: GexRegime::Neutral,
            net_gex: 0.0,
            call_wall: None,
            put_wall: None,
            flip_point: None,
            timestamp: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use condor_core::{AdvisorKind, OptionQuote, Prediction, StrikeSource};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticMarket {
        spot: Option<f64>,
        vix: Option<f64>,
    }

    #[async_trait]
    impl MarketDataProvider for StaticMarket {
        async fn get_spot(&self, _ticker: &str) -> Result<Option<f64>> {
            Ok(self.spot)
        }

        async fn get_vix(&self) -> Result<Option<f64>> {
            Ok(self.vix)
        }
    }

    /// Serves GEX payloads in order, repeating the last.
    struct SequencedGex {
        payloads: Vec<GexData>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GexProvider for SequencedGex {
        async fn get_gex(&self, _ticker: &str) -> Result<Option<GexData>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .payloads
                .get(n.min(self.payloads.len().saturating_sub(1)))
                .cloned())
        }
    }

    struct FixedAdvisor {
        kind: AdvisorKind,
        prediction: Option<Prediction>,
    }

    #[async_trait]
    impl Advisor for FixedAdvisor {
        async fn predict(&self, _features: &AdvisorFeatures) -> Result<Option<Prediction>> {
            Ok(self.prediction.clone())
        }

        fn kind(&self) -> AdvisorKind {
            self.kind
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FlatQuotes;

    #[async_trait]
    impl QuoteService for FlatQuotes {
        async fn get_option_quote(&self, occ_symbol: &str) -> Result<Option<OptionQuote>> {
            // Shorts are the inner strikes: 593 put, 607 call for the default setup.
            let quote = if occ_symbol.ends_with("00593000") || occ_symbol.ends_with("00607000") {
                OptionQuote { bid: 0.40, ask: 0.42 }
            } else {
                OptionQuote { bid: 0.20, ask: 0.22 }
            };
            Ok(Some(quote))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<Signal>>,
        fail: bool,
    }

    #[async_trait]
    impl SignalStore for RecordingStore {
        async fn save(&self, signal: &Signal) -> Result<i64> {
            if self.fail {
                anyhow::bail!("database offline");
            }
            let mut saved = self.saved.lock();
            saved.push(signal.clone());
            Ok(saved.len() as i64)
        }
    }

    fn gex_at(timestamp: DateTime<Utc>) -> GexData {
        GexData {
            call_wall: Some(603.0),
            put_wall: Some(597.0),
            regime: GexRegime::Positive,
            net_gex: 2.0e9,
            flip_point: Some(595.0),
            spot_price: Some(600.0),
            timestamp: Some(timestamp),
        }
    }

    fn market(spot: Option<f64>, vix: Option<f64>) -> Arc<dyn MarketDataProvider> {
        Arc::new(StaticMarket { spot, vix })
    }

    fn gex(payloads: Vec<GexData>) -> Arc<SequencedGex> {
        Arc::new(SequencedGex {
            payloads,
            calls: AtomicUsize::new(0),
        })
    }

    fn oracle(prediction: Prediction) -> Arc<dyn Advisor> {
        Arc::new(FixedAdvisor {
            kind: AdvisorKind::Oracle,
            prediction: Some(prediction),
        })
    }

    fn base() -> Collaborators {
        Collaborators::new(market(Some(600.0), Some(15.0)))
            .with_gex(gex(vec![gex_at(Utc::now())]))
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let cfg = BotConfig {
            contracts: 0,
            ..BotConfig::fortress()
        };
        assert!(SignalGenerator::new(cfg, base()).is_err());
    }

    #[tokio::test]
    async fn missing_vix_blocks_with_no_data() {
        let collab = Collaborators::new(market(Some(600.0), None))
            .with_gex(gex(vec![gex_at(Utc::now())]));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert_eq!(signal.source, SignalSource::BlockedNoData);
        assert!(signal.reasoning.contains("VIX unavailable"));
    }

    #[tokio::test]
    async fn spot_falls_back_to_gex_spot() {
        let collab = Collaborators::new(market(None, Some(15.0)))
            .with_gex(gex(vec![gex_at(Utc::now())]))
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert!(signal.is_valid);
        assert!((signal.snapshot.unwrap().spot - 600.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn required_gex_without_provider_blocks() {
        let collab = Collaborators::new(market(Some(600.0), Some(15.0)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert_eq!(signal.source, SignalSource::BlockedNoData);
        assert!(signal.reasoning.contains("no GEX provider"));
    }

    #[tokio::test]
    async fn optional_gex_trades_on_sd_strikes() {
        let cfg = BotConfig {
            require_gex: false,
            ..BotConfig::fortress()
        };
        let collab = Collaborators::new(market(Some(600.0), Some(15.0)))
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(cfg, collab).unwrap().generate().await;
        assert!(signal.is_valid);
        assert_eq!(signal.source.tag(), "SD_1.2");
    }

    #[tokio::test]
    async fn stale_snapshot_is_refetched_once() {
        let stale = gex_at(Utc::now() - chrono::Duration::seconds(600));
        let provider = gex(vec![stale, gex_at(Utc::now())]);
        let collab = Collaborators::new(market(Some(600.0), Some(15.0)))
            .with_gex(provider.clone())
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert!(signal.is_valid);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(signal.reasoning.contains("refetched"));
    }

    #[tokio::test]
    async fn persistently_stale_snapshot_blocks() {
        let stale = gex_at(Utc::now() - chrono::Duration::seconds(600));
        let provider = gex(vec![stale]);
        let collab = Collaborators::new(market(Some(600.0), Some(15.0)))
            .with_gex(provider.clone())
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert_eq!(signal.source, SignalSource::BlockedStaleData);
        assert!(signal.snapshot.is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn vix_ceiling_blocks_before_advisors() {
        let collab = Collaborators::new(market(Some(600.0), Some(55.0)))
            .with_gex(gex(vec![gex_at(Utc::now())]))
            .with_backup_advisor(oracle(Prediction::new(0.9, 0.9, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert_eq!(signal.source, SignalSource::BlockedVixTooHigh);
        assert!(signal.backup_prediction.is_none());
    }

    #[tokio::test]
    async fn no_advisor_blocks_by_default() {
        let signal = SignalGenerator::new(BotConfig::fortress(), base())
            .unwrap()
            .generate()
            .await;
        assert_eq!(signal.source, SignalSource::BlockedNoPrediction);
        assert!(signal.reasoning.contains("no advisors configured"));
    }

    #[tokio::test]
    async fn no_advisor_fallback_gates_on_local_threshold() {
        let below = BotConfig {
            trade_without_advisor: true,
            default_win_probability: 0.50,
            min_win_probability: 0.55,
            ..BotConfig::fortress()
        };
        let signal = SignalGenerator::new(below, base()).unwrap().generate().await;
        assert_eq!(signal.source, SignalSource::BlockedBelowThreshold);

        let above = BotConfig {
            trade_without_advisor: true,
            default_win_probability: 0.60,
            min_win_probability: 0.55,
            ..BotConfig::fortress()
        };
        let signal = SignalGenerator::new(above, base()).unwrap().generate().await;
        assert!(signal.is_valid);
        assert!((signal.effective_win_probability - 0.60).abs() < 1e-12);
        assert!(signal.prediction_source.is_none());
    }

    #[tokio::test]
    async fn reduced_advice_halves_contracts() {
        let collab = base().with_backup_advisor(oracle(Prediction::new(
            0.58,
            0.6,
            Advice::TradeReduced,
        )));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert!(signal.is_valid);
        assert_eq!(signal.contracts, 5);
        assert_eq!(signal.pricing.unwrap().contracts, 5);
    }

    #[tokio::test]
    async fn reduced_advice_never_goes_below_one_contract() {
        let collab = base().with_backup_advisor(oracle(Prediction::new(
            0.58,
            0.6,
            Advice::TradeReduced,
        )));
        let signal = SignalGenerator::new(BotConfig::samson(), collab)
            .unwrap()
            .generate()
            .await;
        assert_eq!(signal.contracts, 1);
    }

    #[tokio::test]
    async fn live_quotes_price_the_trade_and_audit_leg_ivs() {
        let collab = base()
            .with_quotes(Arc::new(FlatQuotes))
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;

        assert!(signal.is_valid);
        let pricing = signal.pricing.as_ref().unwrap();
        assert_eq!(pricing.source, condor_core::PricingSource::Quoted);
        assert!((pricing.put_credit - 0.18).abs() < 1e-9);
        assert_eq!(signal.leg_ivs.len(), 2);
        assert!(signal.leg_ivs.iter().all(|leg| leg.iv > 0.0));
    }

    #[tokio::test]
    async fn directional_bot_records_direction() {
        let prediction =
            Prediction::new(0.65, 0.7, Advice::Enter).with_suitability(0.3, 0.8);
        let collab = base().with_backup_advisor(oracle(prediction));
        let signal = SignalGenerator::new(BotConfig::solomon(), collab)
            .unwrap()
            .generate()
            .await;
        assert!(signal.is_valid);
        assert_eq!(signal.direction, Some(Direction::Bearish));
    }

    #[tokio::test]
    async fn iron_condor_bot_leaves_direction_unset() {
        let collab =
            base().with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert!(signal.direction.is_none());
    }

    #[tokio::test]
    async fn out_of_range_expiration_blocks_instead_of_panicking() {
        let cfg = BotConfig {
            dte: u32::MAX,
            ..BotConfig::fortress()
        };
        assert!(SignalGenerator::new(cfg, base()).is_err());

        let collab =
            base().with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let mut generator = SignalGenerator::new(BotConfig::fortress(), collab).unwrap();
        generator.config.dte = u32::MAX;
        let signal = generator.generate().await;
        assert!(!signal.is_valid);
        assert_eq!(signal.source, SignalSource::BlockedInvalidStrikes);
        assert!(signal.reasoning.contains("no expiration date"));
    }

    #[tokio::test]
    async fn emergency_strikes_reach_the_signal_source() {
        // GEX walls at 1/20 around a $10 underlying push the long put below zero.
        let walls = GexData {
            call_wall: Some(20.0),
            put_wall: Some(1.0),
            spot_price: Some(10.0),
            ..gex_at(Utc::now())
        };
        let collab = Collaborators::new(market(Some(10.0), Some(15.0)))
            .with_gex(gex(vec![walls]))
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;

        assert!(signal.is_valid);
        assert_eq!(signal.source, SignalSource::Strikes(StrikeSource::Emergency));
        assert_eq!(signal.source.tag(), "EMERGENCY");
        let strikes = signal.strikes.unwrap();
        assert!((strikes.put_short() - 9.0).abs() < 1e-9);
        assert!((strikes.call_short() - 11.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn absent_capabilities_are_named_in_reasoning() {
        let collab =
            base().with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)));
        let signal = SignalGenerator::new(BotConfig::fortress(), collab)
            .unwrap()
            .generate()
            .await;
        assert!(signal
            .reasoning
            .contains("running without ml_advisor, quotes, persistence"));
    }

    #[tokio::test]
    async fn run_cycle_persists_signal() {
        let store = Arc::new(RecordingStore::default());
        let collab = base()
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)))
            .with_store(store.clone());
        let generator = SignalGenerator::new(BotConfig::fortress(), collab).unwrap();
        let signal = generator.run_cycle().await;

        let saved = store.saved.lock();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].scan_id, signal.scan_id);
    }

    #[tokio::test]
    async fn run_cycle_survives_store_failure() {
        let store = Arc::new(RecordingStore {
            saved: Mutex::new(Vec::new()),
            fail: true,
        });
        let collab = base()
            .with_backup_advisor(oracle(Prediction::new(0.7, 0.7, Advice::TradeFull)))
            .with_store(store);
        let generator = SignalGenerator::new(BotConfig::fortress(), collab).unwrap();
        let signal = generator.run_cycle().await;
        assert!(signal.is_valid);
        assert!(generator.capabilities().persistence);
    }
}
