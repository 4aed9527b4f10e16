//! Skirmish - Development Tools

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skirmish_tools::scenario::{run_scenario, RunOptions, Scenario};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "skirmish-tools")]
#[command(about = "Development tools for the skirmish combat core")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a role table or scenario file
    Validate {
        /// Path to the RON file
        path: PathBuf,
        /// Treat the file as a scenario instead of a role table
        #[arg(long)]
        scenario: bool,
    },
    /// Run a scenario headlessly, printing events as JSON lines
    Simulate {
        /// Path to the scenario RON file
        path: PathBuf,
        /// Override the scenario's RNG seed
        #[arg(long)]
        seed: Option<u64>,
        /// Override the tick count
        #[arg(long)]
        ticks: Option<u32>,
        /// Also print behavior state transitions
        #[arg(long)]
        transitions: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if let Err(e) = run(cli.command) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> skirmish_tools::Result<()> {
    match command {
        Commands::Validate { path, scenario } => {
            tracing::info!("Validating {}", path.display());
            if scenario {
                skirmish_tools::validate::validate_scenario(&path)?;
            } else {
                skirmish_tools::validate::validate_role_table(&path)?;
            }
            tracing::info!("Validation passed");
        }
        Commands::Simulate {
            path,
            seed,
            ticks,
            transitions,
        } => {
            let mut scenario = Scenario::load(&path)?;
            if let Some(seed) = seed {
                scenario.config.seed = seed;
            }
            if let Some(ticks) = ticks {
                scenario.ticks = ticks;
            }

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let summary = run_scenario(
                &scenario,
                RunOptions {
                    include_transitions: transitions,
                },
                &mut out,
            )?;
            out.flush()?;
            tracing::info!(
                ticks = summary.ticks_run,
                survivors = ?summary.survivors,
                "Simulation finished"
            );
        }
    }
    Ok(())
}
