//! Error types for the taxigrid crate

use thiserror::Error;

/// Main error type for the taxigrid crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("grid size must be 3 or 4, got {size}")]
    InvalidGridSize { size: u8 },

    #[error("maximum {max} obstacles allowed for a {grid_size}x{grid_size} grid, got {count}")]
    TooManyObstacles {
        count: usize,
        max: usize,
        grid_size: u8,
    },

    #[error("invalid action '{input}'. Expected one of: NORTH, SOUTH, EAST, WEST, PICK, DROP")]
    InvalidAction { input: String },

    #[error("invalid position '{input}'. Expected 'x,y' with integer coordinates")]
    ParsePosition { input: String },

    #[error("{name} must be between 0.0 and 1.0, got {value}")]
    InvalidHyperparameter { name: &'static str, value: f64 },

    #[error("speed must be 1, 10, or 100, got {speed}")]
    InvalidSpeed { speed: u32 },

    #[error("simulation not initialized; create a session first")]
    NotInitialized,

    #[error("operation unavailable while training; stop training first")]
    TrainingInProgress,

    #[error("training already in progress")]
    AlreadyTraining,

    #[error("no training in progress")]
    NotTraining,

    #[error("training worker panicked")]
    WorkerPanicked,

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}
