//! Observer port - abstraction for training telemetry
//!
//! The training loop produces a fixed event vocabulary; observers consume
//! it. The port decouples the loop from output formats: the same events feed
//! a progress bar, a JSONL log, or a channel bridged to a transport layer.
//!
//! # Event Sequence
//!
//! For each training run the methods are called in this order:
//! 1. For each episode:
//!    - `on_episode_start(episode, state)`
//!    - `on_step(update)` - for each environment step
//!    - `on_episode_complete(summary)`
//! 2. `on_training_complete(summary)` - once, when the loop exits
//!
//! Emission is fire-and-forget: an observer error is reported on stderr and
//! the loop keeps running. A slow observer still runs on the loop's thread,
//! so adapters that talk to slow sinks should hand off internally (see
//! `ChannelObserver`).

use crate::{
    Result,
    session::{EpisodeSummary, StepUpdate, TrainingSummary},
    types::StateSnapshot,
};

/// Observer trait for monitoring a training session
///
/// All methods default to no-ops so adapters only implement the events they
/// care about.
pub trait TrainingObserver: Send {
    /// Called when an episode begins, with the post-reset state.
    fn on_episode_start(&mut self, _episode: usize, _state: &StateSnapshot) -> Result<()> {
        Ok(())
    }

    /// Called after every environment step with the full post-step snapshot.
    fn on_step(&mut self, _update: &StepUpdate) -> Result<()> {
        Ok(())
    }

    /// Called when an episode finishes (delivery, step cap, or stop request).
    fn on_episode_complete(&mut self, _summary: &EpisodeSummary) -> Result<()> {
        Ok(())
    }

    /// Called once when the training loop exits and the session returns to
    /// manual mode.
    fn on_training_complete(&mut self, _summary: &TrainingSummary) -> Result<()> {
        Ok(())
    }
}
