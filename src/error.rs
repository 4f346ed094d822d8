use std::path::PathBuf;
use thiserror::Error;

/// Core library errors
#[derive(Error, Debug)]
pub enum SweeperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error at path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install signal handlers: {0}")]
    Signal(#[from] nix::Error),

    #[error("{0}")]
    Other(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl SweeperError {
    /// Attach a path to an IO error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SweeperError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SweeperError>;
