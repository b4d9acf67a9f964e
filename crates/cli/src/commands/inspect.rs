//! Offline inspection commands: `solve-iv` and `strikes`.

use anyhow::Result;
use clap::{Args, ValueEnum};
use condor_core::OptionRight;
use condor_engine::iv_solver::DEFAULT_RISK_FREE_RATE;
use condor_engine::{
    expected_move, formula_credits, IvSolver, SolverConfig, StrikeParams, StrikeRequest,
    StrikeSelector,
};

use super::wiring::{resolve_bot, ConfigArgs};

const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightArg {
    Put,
    Call,
}

impl From<RightArg> for OptionRight {
    fn from(right: RightArg) -> Self {
        match right {
            RightArg::Put => Self::Put,
            RightArg::Call => Self::Call,
        }
    }
}

/// Arguments for the solve-iv command.
#[derive(Args, Debug, Clone)]
pub struct SolveIvArgs {
    /// Observed option price (mid)
    #[arg(long)]
    pub price: f64,

    /// Underlying price
    #[arg(long)]
    pub spot: f64,

    #[arg(long)]
    pub strike: f64,

    /// Calendar days to expiry (fractions allowed)
    #[arg(long)]
    pub days: f64,

    #[arg(long, value_enum, default_value = "put")]
    pub right: RightArg,

    /// Annual risk-free rate
    #[arg(long, default_value_t = DEFAULT_RISK_FREE_RATE)]
    pub rate: f64,
}

/// Arguments for the strikes command.
#[derive(Args, Debug, Clone)]
pub struct StrikesArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(short, long, default_value = "fortress")]
    pub bot: String,

    #[arg(long)]
    pub spot: f64,

    #[arg(long)]
    pub vix: f64,

    #[arg(long)]
    pub put_wall: Option<f64>,

    #[arg(long)]
    pub call_wall: Option<f64>,

    /// Advisor-suggested short put
    #[arg(long)]
    pub advisor_put: Option<f64>,

    /// Advisor-suggested short call
    #[arg(long)]
    pub advisor_call: Option<f64>,
}

pub fn run_solve_iv(args: &SolveIvArgs) {
    let solver = IvSolver::new(SolverConfig {
        risk_free_rate: args.rate,
        ..SolverConfig::default()
    });
    let years = args.days / CALENDAR_DAYS_PER_YEAR;
    let result = solver.solve(args.price, args.spot, args.strike, years, args.right.into());

    println!(
        "iv={:.4} ({:.2}%) method={} converged={} iterations={} error={:.2e} confidence={}",
        result.iv,
        result.iv * 100.0,
        result.method.as_str(),
        result.converged,
        result.iterations,
        result.price_error,
        result.confidence
    );
}

pub fn run_strikes(args: &StrikesArgs) -> Result<()> {
    let config = args.config.load()?;
    let bot = resolve_bot(&config, &args.bot)?;
    let selector = StrikeSelector::new(StrikeParams::from(&bot));

    let em = expected_move(args.spot, args.vix);
    let request = StrikeRequest::new(args.spot, em)
        .with_walls(args.put_wall, args.call_wall)
        .with_advisor_strikes(args.advisor_put, args.advisor_call);
    let selection = selector.select(&request)?;
    let (put_credit, call_credit) =
        formula_credits(&selection.strikes, args.spot, selection.expected_move, args.vix);

    println!(
        "{} {} spot={:.2} vix={:.2}",
        bot.name, bot.ticker, args.spot, args.vix
    );
    println!(
        "  expected move {:.2} (raw {:.2}), floor {:.2}",
        selection.expected_move, em, selection.floor_distance
    );
    println!(
        "  strikes {} via {}",
        selection.strikes.describe(),
        selection.strikes.source()
    );
    println!(
        "  est. credit put {:.2} + call {:.2} = {:.2}",
        put_credit,
        call_credit,
        put_credit + call_credit
    );
    for note in &selection.notes {
        println!("  note: {note}");
    }
    Ok(())
}
