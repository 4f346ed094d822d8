//! Paths that must survive a sweep because something is still using them.
//!
//! Providers are owned by the surrounding system and are not trusted:
//! [`ProtectedSet::snapshot`] is the only place a provider is invoked, and it
//! turns both errors and panics into a [`ProviderError`].

use std::collections::HashSet;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::paths::{absolutize, absolutize_from};

/// Source of in-use paths, queried once per sweep.
pub trait ProtectedPaths: Send + Sync {
    fn protected_paths(&self) -> anyhow::Result<Vec<PathBuf>>;
}

impl<F> ProtectedPaths for F
where
    F: Fn() -> anyhow::Result<Vec<PathBuf>> + Send + Sync,
{
    fn protected_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        self()
    }
}

/// Union of several providers. Any member failing fails the lookup.
impl ProtectedPaths for Vec<Box<dyn ProtectedPaths>> {
    fn protected_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for provider in self {
            paths.extend(provider.protected_paths()?);
        }
        Ok(paths)
    }
}

/// A fixed list of protected paths
#[derive(Debug, Clone, Default)]
pub struct StaticPaths(pub Vec<PathBuf>);

impl ProtectedPaths for StaticPaths {
    fn protected_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Text file listing in-use paths, one per line, re-read on every sweep.
///
/// Blank lines and lines starting with `#` are ignored. Relative entries are
/// resolved against the directory holding the list. A missing list file
/// means nothing is in use.
#[derive(Debug, Clone)]
pub struct ListFile {
    path: PathBuf,
}

impl ListFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProtectedPaths for ListFile {
    fn protected_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("reading protect list {}", self.path.display())))
            }
        };

        let base = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| absolutize_from(&base, Path::new(line)).map_err(Into::into))
            .collect()
    }
}

/// What a sweep does when the provider cannot be consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFailurePolicy {
    /// Fail open: sweep with no protected paths
    #[default]
    #[serde(alias = "sweep-anyway")]
    Sweep,
    /// Fail closed: skip the whole sweep
    #[serde(alias = "skip-sweep")]
    Skip,
}

/// Why a provider snapshot could not be taken
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("protected path provider failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("protected path provider panicked: {0}")]
    Panicked(String),
}

/// De-duplicated, absolute snapshot of protected paths for one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedSet {
    paths: HashSet<PathBuf>,
}

impl ProtectedSet {
    /// Query `provider` inside a failure boundary.
    ///
    /// No provider yields an empty set.
    pub fn snapshot(
        provider: Option<&dyn ProtectedPaths>,
    ) -> std::result::Result<Self, ProviderError> {
        let Some(provider) = provider else {
            return Ok(Self::default());
        };

        let paths = match panic::catch_unwind(AssertUnwindSafe(|| provider.protected_paths())) {
            Ok(Ok(paths)) => paths,
            Ok(Err(e)) => return Err(ProviderError::Failed(e)),
            Err(payload) => return Err(ProviderError::Panicked(panic_message(&*payload))),
        };

        Ok(Self::from_paths(paths))
    }

    /// Normalize raw paths. Empty and unresolvable entries are dropped.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths = paths
            .into_iter()
            .filter(|p| !p.as_ref().as_os_str().is_empty())
            .filter_map(|p| absolutize(p.as_ref()).ok())
            .collect();
        Self { paths }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_provider_is_empty() {
        let set = ProtectedSet::snapshot(None).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_snapshot_normalizes_and_dedups() {
        let provider = StaticPaths(vec![
            PathBuf::from("/data/downloads/a.mp4"),
            PathBuf::from("/data/downloads/./a.mp4"),
            PathBuf::from("/data/tmp/../downloads/a.mp4"),
            PathBuf::new(),
        ]);

        let set = ProtectedSet::snapshot(Some(&provider)).unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.contains(Path::new("/data/downloads/a.mp4")));
    }

    #[test]
    fn test_closure_provider() {
        let provider = || -> anyhow::Result<Vec<PathBuf>> { Ok(vec![PathBuf::from("/x/y")]) };
        let set = ProtectedSet::snapshot(Some(&provider)).unwrap();
        assert!(set.contains(Path::new("/x/y")));
    }

    #[test]
    fn test_failing_provider_is_reported() {
        let provider = || -> anyhow::Result<Vec<PathBuf>> { anyhow::bail!("registry offline") };
        let err = ProtectedSet::snapshot(Some(&provider)).unwrap_err();
        assert!(matches!(err, ProviderError::Failed(_)));
        assert!(err.to_string().contains("registry offline"));
    }

    #[test]
    fn test_panicking_provider_is_contained() {
        let provider = || -> anyhow::Result<Vec<PathBuf>> { panic!("boom") };
        let err = ProtectedSet::snapshot(Some(&provider)).unwrap_err();
        match err {
            ProviderError::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("Expected panic error, got {:?}", other),
        }
    }

    #[test]
    fn test_union_of_providers() {
        let providers: Vec<Box<dyn ProtectedPaths>> = vec![
            Box::new(StaticPaths(vec![PathBuf::from("/a")])),
            Box::new(StaticPaths(vec![PathBuf::from("/b")])),
        ];
        let set = ProtectedSet::snapshot(Some(&providers)).unwrap();
        assert!(set.contains(Path::new("/a")));
        assert!(set.contains(Path::new("/b")));
    }

    #[test]
    fn test_union_fails_if_any_member_fails() {
        let failing = || -> anyhow::Result<Vec<PathBuf>> { anyhow::bail!("nope") };
        let providers: Vec<Box<dyn ProtectedPaths>> = vec![
            Box::new(StaticPaths(vec![PathBuf::from("/a")])),
            Box::new(failing),
        ];
        assert!(ProtectedSet::snapshot(Some(&providers)).is_err());
    }

    #[test]
    fn test_list_file_parsing() {
        let tmp = TempDir::new().unwrap();
        let list = tmp.path().join("in-use.txt");
        fs::write(
            &list,
            "# active downloads\n/data/downloads/a.mp4\n\n  jobs/b.pdf  \n",
        )
        .unwrap();

        let paths = ListFile::new(&list).protected_paths().unwrap();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("/data/downloads/a.mp4"),
                tmp.path().join("jobs/b.pdf"),
            ]
        );
    }

    #[test]
    fn test_missing_list_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = ListFile::new(tmp.path().join("missing.txt"))
            .protected_paths()
            .unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_unreadable_list_file_fails() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be read as a list
        assert!(ListFile::new(tmp.path()).protected_paths().is_err());
    }

    #[test]
    fn test_failure_policy_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ProviderFailurePolicy,
        }

        let w: Wrapper = toml::from_str("policy = \"skip\"").unwrap();
        assert_eq!(w.policy, ProviderFailurePolicy::Skip);
        let w: Wrapper = toml::from_str("policy = \"sweep\"").unwrap();
        assert_eq!(w.policy, ProviderFailurePolicy::Sweep);
        assert_eq!(ProviderFailurePolicy::default(), ProviderFailurePolicy::Sweep);
    }
}
