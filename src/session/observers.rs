//! Observer adapters for training telemetry
//!
//! Adapters for the [`TrainingObserver`] port: a channel bridge for
//! transport layers, a progress bar for CLI runs, and a JSONL writer for
//! offline analysis.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::{Receiver, Sender, channel},
};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    ports::TrainingObserver,
    session::{EpisodeSummary, StepUpdate, TrainingSummary},
    types::StateSnapshot,
};

/// The training loop's event vocabulary as a single serializable enum.
///
/// This is the wire shape a transport layer forwards to remote observers;
/// every variant carries the same state-snapshot schema as synchronous
/// responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainingEvent {
    EpisodeStart {
        episode: usize,
        state: StateSnapshot,
    },
    StepUpdate(StepUpdate),
    EpisodeComplete(EpisodeSummary),
    TrainingComplete(TrainingSummary),
}

/// Forwards events over an in-process channel.
///
/// Sends are non-blocking and a disconnected receiver is ignored, so a slow
/// or absent consumer never stalls the training loop.
pub struct ChannelObserver {
    tx: Sender<TrainingEvent>,
}

impl ChannelObserver {
    /// Create an observer plus the receiving end for the consumer.
    pub fn channel() -> (Self, Receiver<TrainingEvent>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }

    pub fn new(tx: Sender<TrainingEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: TrainingEvent) {
        // A hung-up receiver is not an error worth stopping training for.
        let _ = self.tx.send(event);
    }
}

impl TrainingObserver for ChannelObserver {
    fn on_episode_start(&mut self, episode: usize, state: &StateSnapshot) -> Result<()> {
        self.send(TrainingEvent::EpisodeStart {
            episode,
            state: state.clone(),
        });
        Ok(())
    }

    fn on_step(&mut self, update: &StepUpdate) -> Result<()> {
        self.send(TrainingEvent::StepUpdate(update.clone()));
        Ok(())
    }

    fn on_episode_complete(&mut self, summary: &EpisodeSummary) -> Result<()> {
        self.send(TrainingEvent::EpisodeComplete(summary.clone()));
        Ok(())
    }

    fn on_training_complete(&mut self, summary: &TrainingSummary) -> Result<()> {
        self.send(TrainingEvent::TrainingComplete(summary.clone()));
        Ok(())
    }
}

/// Progress bar observer for CLI training runs.
pub struct ProgressObserver {
    progress_bar: ProgressBar,
}

impl ProgressObserver {
    /// Create a progress observer for a bounded run. An unbounded run
    /// (`target_episodes == 0`) renders without a length.
    pub fn new(target_episodes: usize) -> Result<Self> {
        let progress_bar = if target_episodes > 0 {
            ProgressBar::new(target_episodes as u64)
        } else {
            ProgressBar::no_length()
        };
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} episodes {msg}")
                .map_err(|e| crate::Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        Ok(Self { progress_bar })
    }
}

impl TrainingObserver for ProgressObserver {
    fn on_episode_complete(&mut self, summary: &EpisodeSummary) -> Result<()> {
        self.progress_bar.set_position(summary.episode as u64);
        self.progress_bar.set_message(format!(
            "(mean reward {:.1}, mean steps {:.1})",
            summary.stats.average_reward, summary.stats.average_steps
        ));
        Ok(())
    }

    fn on_training_complete(&mut self, summary: &TrainingSummary) -> Result<()> {
        self.progress_bar.finish_with_message(format!(
            "done: {} episodes, mean reward {:.1}",
            summary.episodes_completed, summary.stats.average_reward
        ));
        Ok(())
    }
}

/// Appends every event as one JSON object per line.
pub struct JsonlObserver {
    writer: BufWriter<File>,
}

impl JsonlObserver {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_event(&mut self, event: &TrainingEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl TrainingObserver for JsonlObserver {
    fn on_episode_start(&mut self, episode: usize, state: &StateSnapshot) -> Result<()> {
        self.write_event(&TrainingEvent::EpisodeStart {
            episode,
            state: state.clone(),
        })
    }

    fn on_step(&mut self, update: &StepUpdate) -> Result<()> {
        self.write_event(&TrainingEvent::StepUpdate(update.clone()))
    }

    fn on_episode_complete(&mut self, summary: &EpisodeSummary) -> Result<()> {
        self.write_event(&TrainingEvent::EpisodeComplete(summary.clone()))
    }

    fn on_training_complete(&mut self, summary: &TrainingSummary) -> Result<()> {
        self.write_event(&TrainingEvent::TrainingComplete(summary.clone()))?;
        self.writer.flush()?;
        Ok(())
    }
}
