use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::RootConfig;

/// Retention Sweeper - deletes expired files from time-limited directories
#[derive(Parser, Debug)]
#[command(name = "retention-sweeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single sweep and exit
    Sweep(SweepArgs),

    /// Sweep on an interval until interrupted
    Run(RunArgs),

    /// Show the effective retention policy
    Policy(PolicyArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Root and protected path overrides shared by `sweep` and `run`
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Root to sweep as PATH=SECS (repeatable, replaces configured roots)
    #[arg(short, long = "root", value_name = "PATH=SECS", value_parser = parse_root)]
    pub roots: Vec<RootConfig>,

    /// Path that must not be deleted (repeatable)
    #[arg(short, long = "protect", value_name = "PATH")]
    pub protect: Vec<PathBuf>,

    /// File listing in-use paths, re-read before every sweep
    #[arg(long, value_name = "FILE")]
    pub protect_list: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output stats as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Sweep interval in seconds (minimum 5)
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,
}

#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a `PATH=SECS` root argument
pub fn parse_root(s: &str) -> Result<RootConfig, String> {
    let (path, secs) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected PATH=SECS, got '{}'", s))?;

    if path.is_empty() {
        return Err("root path is empty".to_string());
    }

    let retention = secs
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid retention '{}': {}", secs, e))?;

    Ok(RootConfig {
        path: PathBuf::from(path),
        retention,
    })
}
