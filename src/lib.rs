//! Grid-world taxi MDP with a tabular Q-learning agent
//!
//! This crate provides:
//! - A deterministic-transition, stochastic-spawn taxi environment with a
//!   connectivity-preserving obstacle layout
//! - A tabular Q-learning agent with epsilon-greedy action selection
//! - A training session that runs episodes on a background worker while
//!   still serving on-demand manual control, streaming progress through
//!   observer ports
//! - Export helpers and a small CLI for training and demo runs
//!
//! The transport that exposes sessions to remote callers is deliberately out
//! of scope; [`session::observers::ChannelObserver`] and the synchronous
//! [`Session`] API are the seams it plugs into.

pub mod cli;
pub mod env;
pub mod error;
pub mod export;
pub mod ports;
pub mod q_learning;
pub mod session;
pub mod types;

pub use env::GridWorld;
pub use error::{Error, Result};
pub use ports::TrainingObserver;
pub use q_learning::{AgentStats, QLearningAgent, QTable};
pub use session::{
    AgentConfig, EpisodeRecord, EpisodeSummary, Mode, Session, StepUpdate, TableEntry,
    TrainingStats, TrainingSummary,
    observers::{ChannelObserver, JsonlObserver, ProgressObserver, TrainingEvent},
};
pub use types::{Action, Position, StateKey, StateSnapshot};
