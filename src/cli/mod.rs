//! CLI infrastructure for the taxigrid simulator
//!
//! Provides the command-line interface for running headless training
//! sessions and interactive demo walks.

pub mod commands;
