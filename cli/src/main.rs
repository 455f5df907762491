use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::Rng;
use targetweave_core::TargetsConfig;
use tracing_subscriber::EnvFilter;

mod sim;

use sim::SoakOptions;

#[derive(Parser)]
#[command(
    name = "targetweave-cli",
    version,
    about = "Drive targetweave clients over an in-memory host"
)]
struct Cli {
    /// TOML file with targeting options.
    #[arg(long, env = "TARGETWEAVE_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the replace / toggle / clear scenario and print every client's frame.
    Scenario,
    /// Run a seeded random session and check that all clients converge.
    Soak {
        #[arg(long, default_value_t = 3)]
        players: usize,
        #[arg(long, default_value_t = 500)]
        steps: usize,
        #[arg(long)]
        seed: Option<String>,
        /// Deliver queued frames in random order.
        #[arg(long)]
        reorder: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => TargetsConfig::load(path)?,
        None => TargetsConfig::default(),
    };

    match cli.command {
        Commands::Scenario => {
            let reports = sim::run_scenario(config).await?;
            let failed: Vec<_> = reports.iter().filter(|report| !report.passed()).collect();
            for report in &failed {
                eprintln!(
                    "step failed: {} (expected {:?}, persisted {:?}, redraws {:?})",
                    report.label,
                    report.expected.as_slice(),
                    report.persisted.as_slice(),
                    report.redraws
                );
            }
            if !failed.is_empty() {
                return Err(format!("{} scenario steps failed", failed.len()).into());
            }
            println!("scenario: {} steps ok", reports.len());
        }
        Commands::Soak {
            players,
            steps,
            seed,
            reorder,
        } => {
            let seed = match seed.as_deref() {
                Some(raw) => parse_seed_arg(raw)?,
                None => rand::rng().random(),
            };
            println!("seed: {seed:#x}");
            let report = sim::run_soak(
                config,
                SoakOptions {
                    players,
                    steps,
                    seed,
                    reorder,
                },
            )
            .await?;
            println!(
                "steps: {} frames: {} writes: {}",
                report.steps, report.frames, report.writes
            );
            for violation in &report.violations {
                eprintln!("violation: {violation}");
            }
            if !report.converged() {
                return Err(format!("{} violations", report.violations.len()).into());
            }
            println!("converged");
        }
    }

    Ok(())
}

fn parse_seed_arg(raw: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let trimmed = raw.trim();
    let value = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)?
    } else {
        trimmed.parse::<u64>()?
    };
    Ok(value)
}
