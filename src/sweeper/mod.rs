//! Retention sweeping: the one-shot engine and the background runner.
//!
//! This module provides:
//! - Per-root retention policies
//! - Protected (in-use) path providers
//! - The sweep engine that deletes expired files and empty directories
//! - A background runner that sweeps on a fixed interval

mod engine;
mod paths;
mod policy;
mod protected;
mod runner;
mod signals;
mod stats;

pub use engine::Sweeper;
pub use paths::absolutize;
pub use policy::{RetentionPolicy, RootPolicy};
pub use protected::{
    ListFile, ProtectedPaths, ProtectedSet, ProviderError, ProviderFailurePolicy, StaticPaths,
};
pub use runner::{Runner, RunnerOptions, RunnerState, DEFAULT_INITIAL_DELAY, MIN_INTERVAL};
pub use signals::install_shutdown_handlers;
pub use stats::SweepStats;
