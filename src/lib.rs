//! Retention Sweeper - a background janitor for time-limited directories
//!
//! This crate provides functionality for:
//! - Deleting files and empty directories that outlived a per-root retention
//! - Protecting in-use paths from deletion
//! - Sweeping on an interval from a background thread with graceful shutdown

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod sweeper;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SweeperError};
pub use sweeper::{RetentionPolicy, Runner, RunnerOptions, SweepStats, Sweeper};
