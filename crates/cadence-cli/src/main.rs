//! Cadence CLI - drive the pipeline engine from the command line.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(author, version, about = "Cadence pipeline engine CLI", long_about = None)]
struct Cli {
    /// Log engine activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered component drivers
    Drivers(commands::drivers::DriversArgs),

    /// List factory topologies
    Topologies(commands::topologies::TopologiesArgs),

    /// Validate a topology file or factory topology
    Validate(commands::validate::ValidateArgs),

    /// Build a topology and stream it on simulated time
    Run(commands::run::RunArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Drivers(args) => commands::drivers::run(args),
        Commands::Topologies(args) => commands::topologies::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
