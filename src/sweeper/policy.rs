use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::absolutize;
use crate::error::{Result, SweeperError};

/// Retention setting for a single root directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootPolicy {
    /// Absolute root directory path
    pub path: PathBuf,

    /// Retention in seconds (<= 0 = exempt)
    pub retention_secs: i64,
}

impl RootPolicy {
    /// Retention as a duration, or `None` when the root is exempt
    pub fn ttl(&self) -> Option<Duration> {
        u64::try_from(self.retention_secs)
            .ok()
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    pub fn is_exempt(&self) -> bool {
        self.ttl().is_none()
    }
}

/// Mapping from root directory to retention duration.
///
/// Roots keep their insertion order. Adding a root that is already present
/// replaces its retention in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    roots: Vec<RootPolicy>,
}

impl RetentionPolicy {
    /// Build a policy from `(path, seconds)` pairs.
    ///
    /// Relative paths are resolved against the current directory.
    pub fn from_secs<I, P>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, i64)>,
        P: AsRef<Path>,
    {
        let mut policy = Self::default();
        for (path, secs) in entries {
            let path = path.as_ref();
            if path.as_os_str().is_empty() {
                return Err(SweeperError::Other("retention root path is empty".into()));
            }
            let path = absolutize(path).map_err(|e| SweeperError::io(path, e))?;
            policy.insert(path, secs);
        }
        Ok(policy)
    }

    fn insert(&mut self, path: PathBuf, retention_secs: i64) {
        match self.roots.iter_mut().find(|r| r.path == path) {
            Some(existing) => existing.retention_secs = retention_secs,
            None => self.roots.push(RootPolicy {
                path,
                retention_secs,
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootPolicy> {
        self.roots.iter()
    }

    /// Roots that are actually swept
    pub fn active(&self) -> impl Iterator<Item = &RootPolicy> {
        self.roots.iter().filter(|r| !r.is_exempt())
    }

    pub fn get(&self, path: &Path) -> Option<&RootPolicy> {
        self.roots.iter().find(|r| r.path == path)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
