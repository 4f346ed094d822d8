//! Subcommand implementations.

pub mod policy;
pub mod run;
pub mod sweep;

use crate::cli::TargetArgs;
use crate::config::Config;
use crate::error::Result;
use crate::sweeper::{ListFile, ProtectedPaths, StaticPaths, Sweeper};

/// Build a sweeper from the config, with command-line overrides applied
pub(crate) fn build_sweeper(config: &Config, target: &TargetArgs) -> Result<Sweeper> {
    let policy = if target.roots.is_empty() {
        config.retention_policy()?
    } else {
        crate::sweeper::RetentionPolicy::from_secs(
            target.roots.iter().map(|r| (r.path.clone(), r.retention)),
        )?
    };

    let mut providers: Vec<Box<dyn ProtectedPaths>> = Vec::new();
    if !target.protect.is_empty() {
        providers.push(Box::new(StaticPaths(target.protect.clone())));
    }
    if let Some(list) = target.protect_list.as_ref().or(config.sweeper.protect_list.as_ref()) {
        providers.push(Box::new(ListFile::new(list)));
    }

    let mut sweeper = Sweeper::new(policy).with_failure_policy(config.failure_policy());
    if !providers.is_empty() {
        sweeper = sweeper.with_protected_paths(providers);
    }

    Ok(sweeper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RootConfig;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_cli_roots_replace_configured_roots() {
        let target = TargetArgs {
            roots: vec![RootConfig {
                path: PathBuf::from("/srv/tmp"),
                retention: 60,
            }],
            ..Default::default()
        };

        let sweeper = build_sweeper(&Config::default(), &target).unwrap();

        assert_eq!(sweeper.policy().len(), 1);
        assert!(sweeper.policy().get(Path::new("/srv/tmp")).is_some());
    }

    #[test]
    fn test_configured_roots_used_by_default() {
        let sweeper = build_sweeper(&Config::default(), &TargetArgs::default()).unwrap();
        assert_eq!(sweeper.policy().len(), 5);
    }
}
