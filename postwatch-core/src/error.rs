//! Error types for postwatch-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, not a file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the resolved path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// An environment override could not be parsed into the field's type.
    #[error("invalid value '{value}' for environment variable {var}")]
    InvalidEnv { var: String, value: String },

    /// The settings parsed but describe an unusable configuration.
    #[error("invalid config: {0}")]
    Invalid(String),
}
