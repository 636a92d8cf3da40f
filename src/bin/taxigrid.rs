//! taxigrid CLI - taxi MDP training and demonstration
//!
//! Provides headless training runs with progress/telemetry output and an
//! interactive demo mode that narrates the agent's decisions.

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taxigrid")]
#[command(version, about = "Grid-world taxi Q-learning simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a training session to completion
    Train(taxigrid::cli::commands::train::TrainArgs),

    /// Let the agent drive and explain its decisions
    Demo(taxigrid::cli::commands::demo::DemoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => taxigrid::cli::commands::train::execute(args)?,
        Commands::Demo(args) => taxigrid::cli::commands::demo::execute(args)?,
    }

    Ok(())
}
