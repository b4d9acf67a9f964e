use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{HistoryArgs, RunArgs, ScanArgs, SolveIvArgs, StrikesArgs};

#[derive(Parser)]
#[command(name = "condor")]
#[command(about = "Iron condor strike selection and signal engine", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan for a bot and print the signal
    Scan(ScanArgs),
    /// Scan on a fixed interval during market hours until Ctrl+C
    Run(RunArgs),
    /// Solve implied volatility for a single option price
    SolveIv(SolveIvArgs),
    /// Select strikes for a given spot/VIX without calling any service
    Strikes(StrikesArgs),
    /// Show recently persisted signals for a bot
    History(HistoryArgs),
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Scan(args) => commands::run_scan(args).await?,
        Commands::Run(args) => commands::run_scheduler(args).await?,
        Commands::SolveIv(args) => commands::run_solve_iv(&args),
        Commands::Strikes(args) => commands::run_strikes(&args)?,
        Commands::History(args) => commands::run_history(args).await?,
    }

    Ok(())
}
