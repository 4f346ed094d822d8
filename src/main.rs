use anyhow::Result;
use clap::{CommandFactory, Parser};

use retention_sweeper::cli::{Cli, Command};
use retention_sweeper::commands;
use retention_sweeper::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(args.shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    // Load configuration, then let the environment override it
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();

    tracing::debug!(?config, "Loaded configuration");

    // Dispatch to subcommand
    match cli.command {
        Command::Sweep(args) => {
            tracing::info!(?args, "Starting sweep");
            commands::sweep::run(args, &config)?;
        }
        Command::Run(args) => {
            tracing::info!(?args, "Starting sweeper");
            commands::run::run(args, &config)?;
        }
        Command::Policy(args) => {
            commands::policy::run(args, &config)?;
        }
        // Handled before config load
        Command::Completions(_) => {}
    }

    Ok(())
}

fn init_logging(verbosity: u8, quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet {
        "warn"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("retention_sweeper={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
