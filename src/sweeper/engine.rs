//! One-shot retention sweep over every configured root.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use super::policy::{RetentionPolicy, RootPolicy};
use super::protected::{ProtectedPaths, ProtectedSet, ProviderFailurePolicy};
use super::stats::SweepStats;

/// Deletes expired files and emptied directories under each root.
///
/// A `Sweeper` has no concurrency of its own. Callers that share one across
/// threads must serialize [`Sweeper::cleanup_once`] themselves.
pub struct Sweeper {
    policy: RetentionPolicy,
    protected: Option<Box<dyn ProtectedPaths>>,
    on_provider_error: ProviderFailurePolicy,
}

impl Sweeper {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            protected: None,
            on_provider_error: ProviderFailurePolicy::default(),
        }
    }

    /// Set the provider consulted for in-use paths before every sweep
    pub fn with_protected_paths(mut self, provider: impl ProtectedPaths + 'static) -> Self {
        self.protected = Some(Box::new(provider));
        self
    }

    pub fn with_failure_policy(mut self, policy: ProviderFailurePolicy) -> Self {
        self.on_provider_error = policy;
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Run one full pass against the current time
    pub fn cleanup_once(&self) -> SweepStats {
        self.cleanup_at(SystemTime::now())
    }

    /// Run one full pass treating `now` as the current time.
    ///
    /// Never fails: every per-path error is counted in
    /// [`SweepStats::errors`] and the pass moves on.
    pub fn cleanup_at(&self, now: SystemTime) -> SweepStats {
        let protected = match ProtectedSet::snapshot(self.protected.as_deref()) {
            Ok(set) => set,
            Err(e) => match self.on_provider_error {
                ProviderFailurePolicy::Sweep => {
                    tracing::warn!(error = %e, "Sweeping without protected paths");
                    ProtectedSet::default()
                }
                ProviderFailurePolicy::Skip => {
                    tracing::warn!(error = %e, "Skipping sweep");
                    return SweepStats {
                        errors: 1,
                        ..Default::default()
                    };
                }
            },
        };

        let mut total = SweepStats::default();
        for root in self.policy.iter() {
            let stats = sweep_root(root, now, &protected);
            if !stats.is_empty() {
                tracing::debug!(root = %root.path.display(), %stats, "Root swept");
            }
            total += stats;
        }

        if !total.is_empty() {
            tracing::info!(
                files = total.files_deleted,
                dirs = total.dirs_deleted,
                errors = total.errors,
                bytes = total.bytes_freed,
                "Sweep completed"
            );
        }

        total
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("policy", &self.policy)
            .field("protected", &self.protected.is_some())
            .field("on_provider_error", &self.on_provider_error)
            .finish()
    }
}

fn sweep_root(root: &RootPolicy, now: SystemTime, protected: &ProtectedSet) -> SweepStats {
    let mut stats = SweepStats::default();

    let Some(ttl) = root.ttl() else {
        tracing::trace!(root = %root.path.display(), "Root exempt from retention");
        return stats;
    };

    if !root.path.is_dir() {
        tracing::debug!(root = %root.path.display(), "Root is not a directory, skipping");
        return stats;
    }

    let Some(cutoff) = now.checked_sub(ttl) else {
        return stats;
    };

    let dir_mtimes = sweep_files(&root.path, cutoff, protected, &mut stats);
    sweep_dirs(&root.path, cutoff, protected, &dir_mtimes, &mut stats);

    stats
}

/// Delete expired non-directory entries under `root`.
///
/// Returns the mtime of every directory seen, captured before any of its
/// children were removed.
fn sweep_files(
    root: &Path,
    cutoff: SystemTime,
    protected: &ProtectedSet,
    stats: &mut SweepStats,
) -> HashMap<PathBuf, SystemTime> {
    let mut dir_mtimes = HashMap::new();

    for result in WalkDir::new(root).min_depth(1) {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                record_walk_error(&err, stats);
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().is_dir() {
            if let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) {
                dir_mtimes.insert(path.to_path_buf(), modified);
            }
            continue;
        }

        if protected.contains(path) {
            tracing::trace!(path = %path.display(), "Protected, skipping");
            continue;
        }

        // Not following links, so this is an lstat
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                record_walk_error(&err, stats);
                continue;
            }
        };

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                record_error(path, "read mtime of", &e, stats);
                continue;
            }
        };

        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(path) {
            Ok(()) => {
                stats.files_deleted += 1;
                stats.bytes_freed += metadata.len();
                tracing::debug!(path = %path.display(), "Deleted expired file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => record_error(path, "delete file", &e, stats),
        }
    }

    dir_mtimes
}

/// Remove empty, expired directories below `root`, deepest first.
fn sweep_dirs(
    root: &Path,
    cutoff: SystemTime,
    protected: &ProtectedSet,
    dir_mtimes: &HashMap<PathBuf, SystemTime>,
    stats: &mut SweepStats,
) {
    for result in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                record_walk_error(&err, stats);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if protected.contains(path) {
            continue;
        }

        match is_empty_dir(path) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                record_error(path, "list directory", &e, stats);
                continue;
            }
        }

        let modified = match dir_mtimes.get(path) {
            Some(t) => *t,
            None => match fs::metadata(path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    record_error(path, "read mtime of", &e, stats);
                    continue;
                }
            },
        };

        if modified >= cutoff {
            continue;
        }

        match fs::remove_dir(path) {
            Ok(()) => {
                stats.dirs_deleted += 1;
                tracing::debug!(path = %path.display(), "Removed empty directory");
            }
            // Gone already, or a writer got there first
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
                ) => {}
            Err(e) => record_error(path, "remove directory", &e, stats),
        }
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

fn record_walk_error(err: &walkdir::Error, stats: &mut SweepStats) {
    if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) {
        return;
    }
    stats.errors += 1;
    tracing::warn!(
        path = ?err.path(),
        error = %err,
        "Failed to walk directory"
    );
}

fn record_error(path: &Path, action: &str, err: &io::Error, stats: &mut SweepStats) {
    stats.errors += 1;
    tracing::warn!(path = %path.display(), error = %err, "Failed to {}", action);
}
