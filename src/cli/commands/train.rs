//! `train` command - run a headless training session

use std::path::PathBuf;

use clap::Parser;

use crate::{
    Result,
    export::write_history_csv,
    session::{
        AgentConfig, Session,
        observers::{JsonlObserver, ProgressObserver},
    },
    types::Position,
};

/// Arguments for the `train` command
#[derive(Debug, Parser)]
pub struct TrainArgs {
    /// Grid size (3 or 4)
    #[arg(long, default_value_t = 4)]
    pub grid_size: u8,

    /// Obstacle cell as `x,y` (repeatable, at most grid-size - 1)
    #[arg(long = "obstacle", value_name = "X,Y")]
    pub obstacles: Vec<Position>,

    /// Number of episodes to run (0 = until interrupted)
    #[arg(long, default_value_t = 200)]
    pub episodes: usize,

    /// Pacing multiplier (1, 10, or 100)
    #[arg(long, default_value_t = 100)]
    pub speed: u32,

    /// Discount factor (0 to 1)
    #[arg(long)]
    pub gamma: Option<f64>,

    /// Learning rate (0 to 1)
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Exploration rate (0 to 1)
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Random seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the per-episode history as CSV to this path
    #[arg(long, value_name = "PATH")]
    pub history: Option<PathBuf>,

    /// Append a JSONL event log to this path
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,
}

/// Run the training session to completion and print a summary.
pub fn execute(args: TrainArgs) -> Result<()> {
    let mut session = Session::new();
    if let Some(seed) = args.seed {
        session = session.with_seed(seed);
    }

    session.create(args.grid_size, &args.obstacles)?;
    session.configure_agent(AgentConfig {
        gamma: args.gamma,
        alpha: args.alpha,
        epsilon: args.epsilon,
    })?;

    session.subscribe(Box::new(ProgressObserver::new(args.episodes)?));
    if let Some(path) = &args.log {
        session.subscribe(Box::new(JsonlObserver::new(path)?));
    }

    session.start_training(args.episodes, args.speed)?;
    session.wait()?;

    let stats = session.training_stats();
    let agent = session.agent_stats()?;
    println!("Training complete:");
    println!("  episodes: {}", stats.episodes_completed);
    println!("  mean reward (last 100): {:.2}", stats.average_reward);
    println!("  mean steps (last 100): {:.2}", stats.average_steps);
    println!("  learned Q-table entries: {}", agent.q_table_size);

    if let Some(path) = &args.history {
        write_history_csv(path, &session.history())?;
        println!("  history written to {}", path.display());
    }

    Ok(())
}
