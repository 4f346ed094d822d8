//! Run command: foreground sweeper that stops on SIGINT/SIGTERM

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{Result, SweeperError};
use crate::sweeper::{install_shutdown_handlers, RetentionPolicy, Runner, RunnerOptions};

/// How often the main thread checks for a shutdown signal
const SIGNAL_POLL: Duration = Duration::from_millis(200);

pub fn run(args: RunArgs, config: &Config) -> Result<()> {
    if !config.sweeper.enabled {
        tracing::info!("Sweeper disabled by configuration");
        println!("Sweeper disabled, nothing to do");
        return Ok(());
    }

    let sweeper = super::build_sweeper(config, &args.target)?;

    if config.sweeper.create_missing_roots {
        create_roots(sweeper.policy())?;
    }

    let options = match args.interval {
        Some(secs) => RunnerOptions::new(Duration::from_secs(secs))
            .with_initial_delay(config.runner_options().initial_delay()),
        None => config.runner_options(),
    };

    let running = Arc::new(AtomicBool::new(true));
    install_shutdown_handlers(Arc::clone(&running))?;

    let mut runner = Runner::new(Arc::new(sweeper), options);
    runner.start()?;

    while running.load(Ordering::SeqCst) {
        thread::sleep(SIGNAL_POLL);
    }

    tracing::info!("Shutdown requested");
    if !runner.stop(config.stop_timeout()) {
        tracing::warn!("Exiting while a sweep is still in progress");
    }

    if let Some(stats) = runner.last_stats() {
        tracing::info!(
            sweeps = runner.sweeps_completed(),
            %stats,
            "Last sweep"
        );
    }

    Ok(())
}

/// Create every root directory that does not exist yet
fn create_roots(policy: &RetentionPolicy) -> Result<()> {
    for root in policy.iter() {
        if root.path.is_dir() {
            continue;
        }
        fs::create_dir_all(&root.path).map_err(|e| SweeperError::io(&root.path, e))?;
        tracing::debug!(root = %root.path.display(), "Created root directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::TargetArgs;
    use tempfile::TempDir;

    #[test]
    fn test_create_roots() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a/nested");
        let b = tmp.path().join("b");
        fs::create_dir(&b).unwrap();

        let policy = RetentionPolicy::from_secs([(&a, 10), (&b, 0)]).unwrap();
        create_roots(&policy).unwrap();

        assert!(a.is_dir());
        assert!(b.is_dir());
    }

    #[test]
    fn test_disabled_config_returns_immediately() {
        let mut config = Config::default();
        config.sweeper.enabled = false;

        let args = RunArgs {
            target: TargetArgs::default(),
            interval: None,
        };

        assert!(run(args, &config).is_ok());
    }
}
