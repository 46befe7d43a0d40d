//! TOML configuration for the selector, the perturbation helper and logging.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ml::perturbation::DEFAULT_NOISE_STD;

/// Default file name looked up by the refit utility.
pub const CONFIG_FILE_NAME: &str = "stable_tree.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`AppConfig`].
    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value outside its allowed range.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

/// Hyperparameters of [`crate::ml::stable::StableDecisionTree`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StableTreeConfig {
    /// Weight of the structural distance in the candidate score.
    pub lambda_stability: f64,
    /// Maximum tree depth; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Base random state for the base tree and candidate offsets.
    pub random_state: Option<u64>,
}

impl Default for StableTreeConfig {
    fn default() -> Self {
        Self {
            lambda_stability: 0.1,
            max_depth: None,
            random_state: None,
        }
    }
}

impl StableTreeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.lambda_stability.is_finite() || self.lambda_stability < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "lambda_stability",
                message: format!("must be a finite value >= 0, got {}", self.lambda_stability),
            });
        }
        if self.max_depth == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_depth",
                message: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for [`crate::ml::perturbation::perturb_dataset`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Standard deviation of the additive Gaussian noise.
    pub noise_std: f64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            noise_std: DEFAULT_NOISE_STD,
        }
    }
}

/// Settings for [`crate::logging::init`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for log files; defaults to the application log directory.
    pub directory: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Number of log files kept after pruning.
    pub max_files: usize,
    /// Also write log lines to stdout.
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: "info".to_string(),
            max_files: 10,
            stdout: true,
        }
    }
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: StableTreeConfig,
    pub perturbation: PerturbationConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        if !self.perturbation.noise_std.is_finite() || self.perturbation.noise_std < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "noise_std",
                message: format!(
                    "must be a finite value >= 0, got {}",
                    self.perturbation.noise_std
                ),
            });
        }
        Ok(())
    }
}
