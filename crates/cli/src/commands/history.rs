//! `history` command: recent persisted signals and a per-source tally.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use clap::Args;
use condor_data::IcSignalRepository;

use super::wiring::{resolve_bot, ConfigArgs};

/// Arguments for the history command.
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(short, long, default_value = "fortress")]
    pub bot: String,

    /// Number of recent signals to list
    #[arg(long, default_value_t = 20)]
    pub limit: i64,

    /// Window for the per-source tally, in days
    #[arg(long, default_value_t = 7)]
    pub days: i64,
}

pub async fn run_history(args: HistoryArgs) -> Result<()> {
    let config = args.config.load()?;
    let bot = resolve_bot(&config, &args.bot)?;
    let pool = condor_data::connect_configured(&config.database)
        .await?
        .ok_or_else(|| anyhow!("history needs database.url (or CONDOR_DATABASE__URL)"))?;
    let repo = IcSignalRepository::new(pool);

    let records = repo.recent(&bot.name, args.limit.max(1)).await?;
    if records.is_empty() {
        println!("No signals stored for {}", bot.name);
        return Ok(());
    }

    for record in &records {
        let strikes = match (record.put_short, record.call_short) {
            (Some(put), Some(call)) => format!("{put}P/{call}C"),
            _ => "-".to_string(),
        };
        println!(
            "{} {:<24} {:<14} credit={} {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.source,
            strikes,
            record
                .total_credit
                .map_or_else(|| "-".to_string(), |c| format!("{c:.2}")),
            record.reasoning
        );
    }

    let end = Utc::now();
    let start = end - Duration::days(args.days.max(1));
    println!("\nLast {} days:", args.days.max(1));
    for count in repo.count_by_source(&bot.name, start, end).await? {
        println!("  {:<24} {}", count.source, count.count);
    }
    Ok(())
}
