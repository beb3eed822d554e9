use anyhow::Result;
use clap::{Parser, ValueEnum};
use deadlock_sim::{
    BANNER, DEFAULT_TRANSACTIONS, DetectionStrategy, DetectorConfig, RestartPolicy, Simulation,
    StressConfig,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// Direct 2-cycles between pairs of waiters
    Pairwise,
    /// Cycles of any length in the full wait-for graph
    Graph,
}

impl From<Strategy> for DetectionStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Pairwise => DetectionStrategy::Pairwise,
            Strategy::Graph => DetectionStrategy::WaitForGraph,
        }
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Two-resource deadlock simulation with detection and restart"
)]
struct Cli {
    /// Number of transactions, with identities 0..N
    #[arg(short = 'n', long, default_value_t = DEFAULT_TRANSACTIONS)]
    transactions: usize,

    /// Maximum random pause between two steps of an attempt (ms)
    #[arg(long, default_value_t = 300)]
    step_delay_ms: u64,

    /// Maximum random pause between two transaction launches (ms)
    #[arg(long, default_value_t = 100)]
    startup_delay_ms: u64,

    /// Pause between two detector sweeps (ms)
    #[arg(long, default_value_t = 500)]
    detector_interval_ms: u64,

    /// Upper bound between two re-checks of a blocked acquire (ms)
    #[arg(long, default_value_t = 50)]
    poll_interval_ms: u64,

    /// Cycle search used by the detector
    #[arg(long, value_enum, default_value_t = Strategy::Pairwise)]
    strategy: Strategy,

    /// Give up on a transaction after this many restarts
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Base backoff before a restart, doubled per further restart (ms)
    #[arg(long, default_value_t = 0)]
    backoff_ms: u64,

    /// Write every event as a JSON line to this file ("{timestamp}" is expanded)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not print narration to the console
    #[arg(short, long)]
    quiet: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut simulation = Simulation::new()
        .transactions(cli.transactions)
        .stress(StressConfig {
            max_step_delay_ms: cli.step_delay_ms,
            max_startup_delay_ms: cli.startup_delay_ms,
        })
        .detector(DetectorConfig {
            interval: Duration::from_millis(cli.detector_interval_ms),
            strategy: cli.strategy.into(),
        })
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .restart_policy(RestartPolicy {
            max_restarts: cli.max_restarts,
            backoff: Duration::from_millis(cli.backoff_ms),
        })
        .console(!cli.quiet);
    if let Some(path) = &cli.log_file {
        simulation = simulation.with_log(path);
    }

    if !cli.quiet && !cli.json {
        println!("{BANNER}");
    }

    let report = simulation.run()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Committed {:?} in {} ms: {} deadlock(s), {} restart(s), abandoned {:?}",
            report.committed,
            report.elapsed_ms,
            report.deadlocks,
            report.restarts,
            report.abandoned
        );
    }
    Ok(())
}
