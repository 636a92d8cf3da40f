//! Ports - abstractions at the boundaries of the simulation core
//!
//! Following hexagonal architecture, ports define the seams where external
//! collaborators (a websocket transport, a CLI, a test harness) plug into
//! the training session without the core knowing about them.

pub mod observer;

pub use observer::TrainingObserver;
