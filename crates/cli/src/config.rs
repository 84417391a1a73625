//! CLI configuration.
//!
//! Values are layered, later sources winning:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, else `rewind.toml` in the working directory if present)
//! 3. `REWIND__*` environment variables, `__` separating nested keys
//!    (e.g. `REWIND__STORE__MAX_CHAIN_LENGTH=16`)
//! 4. Command-line flags

// The schemars `JsonSchema` derive expands to code using `.unwrap()`.
#![allow(clippy::disallowed_methods)]

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use rewind_types::{DeltaAlgorithm, StoreConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{InvalidConfigSnafu, LoadConfigSnafu, RenderSnafu, Result};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "rewind.toml";

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "REWIND";

/// Log output format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON when stdout is not a terminal, text otherwise.
    #[default]
    Auto,
    /// Human-readable text.
    Text,
    /// One JSON object per event.
    Json,
}

/// Runtime configuration of the `rewind` binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CliConfig {
    /// Store settings. Must match the settings the snapshot file was written with.
    #[serde(default)]
    pub store: StoreConfig,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Flag-level overrides applied on top of file and environment values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--log-format`.
    pub log_format: Option<LogFormat>,
    /// `--algorithm`.
    pub delta_algorithm: Option<DeltaAlgorithm>,
    /// `--max-chain-length`.
    pub max_chain_length: Option<usize>,
}

impl CliConfig {
    /// Loads configuration from the optional file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::LoadConfig`](crate::CliError::LoadConfig) if an
    /// explicit file is missing or any source fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Loads configuration, reading environment overrides from `env` instead
    /// of the process environment when given.
    pub fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => {
                builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
            },
        };

        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        builder.build().and_then(|c| c.try_deserialize::<Self>()).context(LoadConfigSnafu)
    }

    /// Applies flag overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::InvalidConfig`](crate::CliError::InvalidConfig) if
    /// the merged store settings are out of range.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }
        if let Some(algorithm) = overrides.delta_algorithm {
            self.store.delta_algorithm = algorithm;
        }
        if let Some(length) = overrides.max_chain_length {
            self.store.max_chain_length = length;
        }
        self.store.validate().context(InvalidConfigSnafu)?;
        Ok(self)
    }
}

/// Path of the config file that [`CliConfig::load`] would read, if any.
pub fn resolved_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    }
}

/// JSON schema of [`CliConfig`], pretty-printed.
pub fn config_schema() -> Result<String> {
    let schema = schemars::schema_for!(CliConfig);
    serde_json::to_string_pretty(&schema).context(RenderSnafu)
}

/// Parses `--algorithm` values.
pub(crate) fn parse_algorithm(value: &str) -> std::result::Result<DeltaAlgorithm, String> {
    match value.to_ascii_lowercase().as_str() {
        "suffix" => Ok(DeltaAlgorithm::Suffix),
        "zstd" => Ok(DeltaAlgorithm::Zstd),
        other => Err(format!("unknown delta algorithm '{other}' (expected suffix or zstd)")),
    }
}
