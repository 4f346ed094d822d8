//! Sweep command implementation

use crate::cli::SweepArgs;
use crate::config::Config;
use crate::error::{Result, SweeperError};
use crate::sweeper::SweepStats;

/// Exit status when some paths could not be processed
pub const PARTIAL_FAILURE_EXIT: i32 = 5;

/// Run the sweep command
pub fn run(args: SweepArgs, config: &Config) -> Result<()> {
    let sweeper = super::build_sweeper(config, &args.target)?;

    tracing::info!(roots = sweeper.policy().len(), "Running one-shot sweep");
    let stats = sweeper.cleanup_once();

    if args.json {
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|e| SweeperError::Other(format!("Failed to encode stats: {}", e)))?;
        println!("{}", json);
    } else {
        print_summary(&stats);
    }

    if stats.errors > 0 {
        std::process::exit(PARTIAL_FAILURE_EXIT);
    }

    Ok(())
}

fn print_summary(stats: &SweepStats) {
    println!("Sweep results:");
    println!("  Files deleted:       {}", stats.files_deleted);
    println!("  Directories deleted: {}", stats.dirs_deleted);
    println!(
        "  Freed:               {}",
        humansize::format_size(stats.bytes_freed, humansize::BINARY)
    );
    if stats.errors > 0 {
        eprintln!("  Errors:              {}", stats.errors);
    }
}
