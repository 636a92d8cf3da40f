//! Episode-history export
//!
//! Writers for the per-episode training history, for plotting learning
//! curves outside the process.

use std::{fs::File, path::Path};

use crate::{Result, session::EpisodeRecord};

/// Write the episode history as CSV with an `episode,steps,total_reward`
/// header.
pub fn write_history_csv<P: AsRef<Path>>(path: P, history: &[EpisodeRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in history {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the episode history as a pretty-printed JSON array.
pub fn write_history_json<P: AsRef<Path>>(path: P, history: &[EpisodeRecord]) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, history)?;
    Ok(())
}
