use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::sweeper::{ProviderFailurePolicy, RetentionPolicy, RunnerOptions};

/// Values accepted as "true" for boolean environment overrides
const TRUTHY: &[&str] = &["1", "true", "t", "yes", "y", "on"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sweeper: SweeperConfig,
    pub folders: FolderConfig,
    pub retention: RetentionConfig,
    /// Extra roots, swept after the well-known folders
    pub roots: Vec<RootConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Whether the background sweeper runs at all
    pub enabled: bool,
    /// Sweep interval in seconds (floored to 5)
    pub interval: u64,
    /// Delay before the first sweep in seconds
    pub initial_delay: u64,
    /// Seconds to wait for an in-flight sweep on shutdown
    pub stop_timeout: u64,
    /// Create missing root directories on startup
    pub create_missing_roots: bool,
    /// What to do when the protected path list cannot be read
    pub on_provider_error: ProviderFailurePolicy,
    /// File listing in-use paths, re-read before every sweep
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_list: Option<PathBuf>,
}

/// Directories the surrounding service writes into
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub downloads: PathBuf,
    pub pdf_uploads: PathBuf,
    pub excel_outputs: PathBuf,
    pub word_outputs: PathBuf,
    pub image_outputs: PathBuf,
}

/// Retention in seconds (<= 0 = never sweep)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Applies to downloads and generated documents
    pub download: i64,
    /// Applies to uploaded PDFs
    pub upload: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    pub path: PathBuf,
    /// Retention in seconds (<= 0 = never sweep)
    pub retention: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 300,
            initial_delay: 1,
            stop_timeout: 2,
            create_missing_roots: true,
            on_provider_error: ProviderFailurePolicy::Sweep,
            protect_list: None,
        }
    }
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            downloads: PathBuf::from("/data/downloads"),
            pdf_uploads: PathBuf::from("/data/pdf_uploads"),
            excel_outputs: PathBuf::from("/data/excel_outputs"),
            word_outputs: PathBuf::from("/data/word_outputs"),
            image_outputs: PathBuf::from("/data/image_outputs"),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            download: 600,
            upload: 300,
        }
    }
}

impl Config {
    /// Default config file location (`~/.config/retention-sweeper/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("retention-sweeper").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used if present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;

        let config: Config =
            toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: path.clone(),
                source,
            })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config file");

        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        // Interval is floored by RunnerOptions, so zero is accepted
        if self.sweeper.stop_timeout == 0 {
            return Err(ConfigError::Invalid(
                "sweeper.stop_timeout must be greater than zero".into(),
            ));
        }

        for (name, path) in self.folder_entries() {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("folders.{} is empty", name)));
            }
        }

        if let Some(root) = self.roots.iter().find(|r| r.path.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "root with retention {} has an empty path",
                root.retention
            )));
        }

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Integers that fail to parse leave the current value in place.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let folders = [
            ("DOWNLOAD_FOLDER", &mut self.folders.downloads),
            ("PDF_DOWNLOAD_FOLDER", &mut self.folders.pdf_uploads),
            ("EXCEL_DOWNLOAD_FOLDER", &mut self.folders.excel_outputs),
            ("WORD_DOWNLOAD_FOLDER", &mut self.folders.word_outputs),
            ("IMAGE_DOWNLOAD_FOLDER", &mut self.folders.image_outputs),
        ];
        for (name, folder) in folders {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *folder = PathBuf::from(value);
            }
        }

        self.retention.download = env_int(
            &lookup,
            "DOWNLOAD_RETENTION_SECONDS",
            self.retention.download,
        );
        self.retention.upload =
            env_int(&lookup, "UPLOAD_RETENTION_SECONDS", self.retention.upload);

        let interval = env_int(
            &lookup,
            "CLEANUP_INTERVAL_SECONDS",
            self.sweeper.interval as i64,
        );
        self.sweeper.interval = interval.max(0) as u64;

        if let Some(value) = lookup("CLEANUP_ENABLED") {
            self.sweeper.enabled = is_truthy(&value);
        }
    }

    fn folder_entries(&self) -> [(&'static str, &PathBuf); 5] {
        [
            ("downloads", &self.folders.downloads),
            ("pdf_uploads", &self.folders.pdf_uploads),
            ("excel_outputs", &self.folders.excel_outputs),
            ("word_outputs", &self.folders.word_outputs),
            ("image_outputs", &self.folders.image_outputs),
        ]
    }

    /// Retention entries in sweep order: well-known folders, then extra roots
    pub fn retention_entries(&self) -> Vec<(PathBuf, i64)> {
        let mut entries = vec![
            (self.folders.downloads.clone(), self.retention.download),
            (self.folders.excel_outputs.clone(), self.retention.download),
            (self.folders.word_outputs.clone(), self.retention.download),
            (self.folders.image_outputs.clone(), self.retention.download),
            (self.folders.pdf_uploads.clone(), self.retention.upload),
        ];
        entries.extend(self.roots.iter().map(|r| (r.path.clone(), r.retention)));
        entries
    }

    pub fn retention_policy(&self) -> Result<RetentionPolicy> {
        RetentionPolicy::from_secs(self.retention_entries())
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions::new(Duration::from_secs(self.sweeper.interval))
            .with_initial_delay(Duration::from_secs(self.sweeper.initial_delay))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.sweeper.stop_timeout)
    }

    pub fn failure_policy(&self) -> ProviderFailurePolicy {
        self.sweeper.on_provider_error
    }
}

fn env_int<F>(lookup: &F, name: &str, current: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => current,
        Some(value) if value.trim().is_empty() => current,
        Some(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(name, value = %value, "Ignoring non-integer override");
                current
            }
        },
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUTHY.contains(&value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.sweeper.enabled);
        assert_eq!(config.sweeper.interval, 300);
        assert_eq!(config.retention.download, 600);
        assert_eq!(config.retention.upload, 300);
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[sweeper]"));
        assert!(toml_str.contains("[folders]"));
    }

    #[test]
    fn default_policy_maps_folders() {
        let policy = Config::default().retention_policy().unwrap();
        assert_eq!(policy.len(), 5);
        assert_eq!(
            policy.get(Path::new("/data/pdf_uploads")).unwrap().retention_secs,
            300
        );
        assert_eq!(
            policy.get(Path::new("/data/image_outputs")).unwrap().retention_secs,
            600
        );
    }

    #[test]
    fn extra_roots_are_appended() {
        let mut config = Config::default();
        config.roots.push(RootConfig {
            path: PathBuf::from("/var/tmp/scratch"),
            retention: 3600,
        });

        let policy = config.retention_policy().unwrap();
        let last = policy.iter().last().unwrap();
        assert_eq!(last.path, PathBuf::from("/var/tmp/scratch"));
        assert_eq!(last.retention_secs, 3600);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config.apply_env_with(lookup_from(&[
            ("DOWNLOAD_FOLDER", "/srv/dl"),
            ("DOWNLOAD_RETENTION_SECONDS", "120"),
            ("UPLOAD_RETENTION_SECONDS", "-1"),
            ("CLEANUP_INTERVAL_SECONDS", "30"),
            ("CLEANUP_ENABLED", "no"),
        ]));

        assert_eq!(config.folders.downloads, PathBuf::from("/srv/dl"));
        assert_eq!(config.retention.download, 120);
        assert_eq!(config.retention.upload, -1);
        assert_eq!(config.sweeper.interval, 30);
        assert!(!config.sweeper.enabled);
    }

    #[test]
    fn invalid_env_int_keeps_current_value() {
        let mut config = Config::default();
        config.apply_env_with(lookup_from(&[
            ("DOWNLOAD_RETENTION_SECONDS", "ten minutes"),
            ("UPLOAD_RETENTION_SECONDS", ""),
        ]));

        assert_eq!(config.retention.download, 600);
        assert_eq!(config.retention.upload, 300);
    }

    #[test]
    fn negative_interval_override_is_floored_by_runner() {
        let mut config = Config::default();
        config.apply_env_with(lookup_from(&[("CLEANUP_INTERVAL_SECONDS", "-20")]));

        assert_eq!(config.sweeper.interval, 0);
        assert_eq!(
            config.runner_options().interval(),
            crate::sweeper::MIN_INTERVAL
        );
    }

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "T", " yes ", "Y", "ON"] {
            assert!(is_truthy(value), "{:?} should be truthy", value);
        }
        for value in ["0", "false", "off", "", "enabled"] {
            assert!(!is_truthy(value), "{:?} should be falsy", value);
        }
    }

    #[test]
    fn zero_interval_is_floored_not_rejected() {
        let mut config = Config::default();
        config.sweeper.interval = 0;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.runner_options().interval(),
            crate::sweeper::MIN_INTERVAL
        );
    }

    #[test]
    fn empty_root_path_is_invalid() {
        let mut config = Config::default();
        config.roots.push(RootConfig {
            path: PathBuf::new(),
            retention: 10,
        });
        assert!(config.validate().is_err());
    }
}
