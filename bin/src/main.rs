//! makro CLI binary.
//!
//! Ranks countries from macro indicator observations, allocates weights from
//! score files, and lists the available methods.

mod cmd;
mod data;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "makro")]
#[command(about = "Country ranking from macroeconomic indicators", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ranking pipeline over an observation table
    Rank {
        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Observations CSV with columns indicator, country, date, value
        #[arg(short, long)]
        input: PathBuf,

        /// Wide prices CSV (date plus one column per country) for the backtest
        #[arg(short, long)]
        prices: Option<PathBuf>,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Turn a score file into portfolio weights
    Allocate {
        /// Scores CSV with columns country, score
        #[arg(short, long)]
        scores: PathBuf,

        /// Minimum weight per country
        #[arg(long, default_value = "0.0")]
        min_alloc: f64,

        /// Maximum weight per country
        #[arg(long, default_value = "1.0")]
        max_alloc: f64,

        /// Keep only the best N countries
        #[arg(long)]
        top_n: Option<usize>,

        /// Score threshold; switches to threshold-power weights
        #[arg(long)]
        threshold: Option<f64>,

        /// Exponent applied above the threshold
        #[arg(long, default_value = "1.0", requires = "threshold")]
        power: f64,
    },

    /// List standardization and allocation methods
    Methods,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Rank {
            config,
            input,
            prices,
            json,
        } => cmd::rank::run(&config, &input, prices.as_deref(), json),
        Commands::Allocate {
            scores,
            min_alloc,
            max_alloc,
            top_n,
            threshold,
            power,
        } => cmd::allocate::run(&scores, min_alloc, max_alloc, top_n, threshold, power),
        Commands::Methods => {
            cmd::methods::run();
            Ok(())
        }
    }
}
