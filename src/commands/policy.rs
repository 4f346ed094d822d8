//! Policy command: print the effective retention policy

use crate::cli::PolicyArgs;
use crate::config::Config;
use crate::error::{Result, SweeperError};
use crate::sweeper::{RetentionPolicy, RootPolicy};

pub fn run(args: PolicyArgs, config: &Config) -> Result<()> {
    let policy = config.retention_policy()?;

    if args.json {
        let json = serde_json::to_string_pretty(&policy)
            .map_err(|e| SweeperError::Other(format!("Failed to encode policy: {}", e)))?;
        println!("{}", json);
    } else {
        print!("{}", format_policy(&policy, config));
    }

    Ok(())
}

fn format_policy(policy: &RetentionPolicy, config: &Config) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Sweeper {} (interval {}s)\n",
        if config.sweeper.enabled { "enabled" } else { "disabled" },
        config.runner_options().interval().as_secs()
    ));
    for root in policy.iter() {
        out.push_str(&format!("  {:<40} {}\n", root.path.display(), describe(root)));
    }
    out
}

fn describe(root: &RootPolicy) -> String {
    match root.ttl() {
        Some(ttl) => format!("{}s", ttl.as_secs()),
        None => "exempt".to_string(),
    }
}
