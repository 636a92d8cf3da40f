//! `demo` command - interactive walk through the environment

use clap::Parser;

use crate::{Result, session::Session, types::Position};

/// Arguments for the `demo` command
#[derive(Debug, Parser)]
pub struct DemoArgs {
    /// Grid size (3 or 4)
    #[arg(long, default_value_t = 3)]
    pub grid_size: u8,

    /// Obstacle cell as `x,y` (repeatable)
    #[arg(long = "obstacle", value_name = "X,Y")]
    pub obstacles: Vec<Position>,

    /// Number of agent-chosen steps to run
    #[arg(long, default_value_t = 20)]
    pub steps: u32,

    /// Random seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Let the agent drive for a few steps, narrating each decision.
pub fn execute(args: DemoArgs) -> Result<()> {
    let mut session = Session::new();
    if let Some(seed) = args.seed {
        session = session.with_seed(seed);
    }
    session.create(args.grid_size, &args.obstacles)?;

    for _ in 0..args.steps {
        let update = session.manual_step(None)?;
        let passenger = match (update.state.passenger_aboard, update.state.passenger) {
            (true, _) => "aboard".to_string(),
            (false, Some(p)) => format!("waiting at {p}"),
            (false, None) => "none".to_string(),
        };
        println!(
            "step {:>3}: {:<5} reward {:>4}  taxi {}  passenger {}  total {:.0}",
            update.step,
            update.action.token(),
            update.reward,
            update.state.taxi,
            passenger,
            update.total_reward,
        );
    }

    println!();
    println!("{}", session.explain_decision()?);
    Ok(())
}
