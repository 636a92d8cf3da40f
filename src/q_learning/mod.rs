//! Tabular Q-learning
//!
//! This module implements the learning half of the simulator: a Q-table
//! keyed by `(StateKey, Action)` and an epsilon-greedy agent that updates it
//! with the standard Bellman rule
//!
//! ```text
//! Q(s,a) <- Q(s,a) + alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))
//! ```
//!
//! Unseen entries read as 0.0, so a never-visited state is a six-way tie and
//! the greedy path degenerates to a uniform random choice.
//!
//! ## Usage
//!
//! ```no_run
//! use taxigrid::q_learning::QLearningAgent;
//!
//! let agent = QLearningAgent::new(
//!     0.9, // gamma (discount factor)
//!     0.1, // alpha (learning rate)
//!     0.1, // epsilon (exploration rate)
//! )?;
//! # Ok::<(), taxigrid::Error>(())
//! ```

pub mod agent;
pub mod q_table;

// Public re-exports
pub use agent::{AgentStats, QLearningAgent};
pub use q_table::QTable;
