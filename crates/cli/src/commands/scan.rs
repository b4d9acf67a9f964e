//! `scan` and `run` commands.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use condor_core::Signal;
use condor_engine::{calendar, SignalGenerator};

use super::wiring::{resolve_bot, ConfigArgs, Wiring};

/// Arguments for the scan command.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Bot name (fortress, pegasus, samson, solomon, or a configured bot)
    #[arg(short, long, default_value = "fortress")]
    pub bot: String,

    /// Keep the signal in memory instead of writing it to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print the full signal as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Bots to scan each cycle (repeatable)
    #[arg(short, long = "bot", required = true)]
    pub bots: Vec<String>,

    /// Keep signals in memory instead of writing them to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Override `scheduler.interval_secs`
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Scan outside regular market hours
    #[arg(long)]
    pub ignore_market_hours: bool,
}

pub async fn run_scan(args: ScanArgs) -> Result<()> {
    let config = args.config.load()?;
    let bot = resolve_bot(&config, &args.bot)?;
    let wiring = Wiring::connect(&config, args.dry_run).await?;
    let generator = wiring.generator(bot)?;

    let signal = generator.run_cycle().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&signal)?);
    } else {
        print_signal(&signal);
    }
    Ok(())
}

pub async fn run_scheduler(args: RunArgs) -> Result<()> {
    let config = args.config.load()?;
    let wiring = Wiring::connect(&config, args.dry_run).await?;

    let generators = args
        .bots
        .iter()
        .map(|name| resolve_bot(&config, name).and_then(|bot| wiring.generator(bot)))
        .collect::<Result<Vec<_>>>()?;

    let interval_secs = args
        .interval_secs
        .unwrap_or(config.scheduler.interval_secs)
        .max(1);
    let market_hours_only = config.scheduler.market_hours_only && !args.ignore_market_hours;

    tracing::info!(
        bots = ?args.bots,
        interval_secs,
        market_hours_only,
        "Starting scheduler"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if market_hours_only && !calendar::is_market_open(Utc::now()) {
                    tracing::debug!("Market closed, skipping cycle");
                    continue;
                }
                for generator in &generators {
                    let signal = generator.run_cycle().await;
                    tracing::info!(
                        bot = %signal.bot,
                        source = %signal.source,
                        valid = signal.is_valid,
                        "{}",
                        signal.summary()
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    for generator in &generators {
        print_solver_stats(generator);
    }
    tracing::info!("Scheduler stopped");
    Ok(())
}

fn print_signal(signal: &Signal) {
    println!("{}", signal.summary());
    println!("  scan:      {}", signal.scan_id);
    println!("  source:    {}", signal.source);
    if let Some(em) = signal.expected_move {
        println!("  exp. move: {em:.2}");
    }
    if let Some(direction) = signal.direction {
        println!("  direction: {direction}");
    }
    for leg in &signal.leg_ivs {
        println!(
            "  {} {} mid {:.2} iv {:.1}% ({:?})",
            leg.right,
            leg.strike,
            leg.mid,
            leg.iv * 100.0,
            leg.confidence
        );
    }
    println!("  reasoning: {}", signal.reasoning);
}

fn print_solver_stats(generator: &SignalGenerator) {
    let stats = generator.solver_stats();
    println!(
        "{}: IV solver calls={} newton={} bisection={} empirical={} invalid={} success={:.1}%",
        generator.config().name,
        stats.total_calls,
        stats.newton_successes,
        stats.bisection_successes,
        stats.empirical_fallbacks,
        stats.invalid_inputs,
        stats.success_rate() * 100.0
    );
}
