//! Configuration types for the rewind store.
//!
//! Config structs validate their values at construction time via fallible
//! builders. Post-deserialization validation is available via `validate()`.

// The schemars `JsonSchema` derive expands to code using `.unwrap()`.
#![allow(clippy::disallowed_methods)]

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Smallest permitted diff-chain bound.
const MIN_CHAIN_LENGTH: usize = 1;

/// Largest permitted diff-chain bound.
const MAX_CHAIN_LENGTH: usize = 1024;

/// Minimum zstd compression level.
const MIN_COMPRESSION_LEVEL: i32 = 1;

/// Maximum zstd compression level.
const MAX_COMPRESSION_LEVEL: i32 = 22;

/// Configuration validation error.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Binary delta algorithm used between consecutive versions of a key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DeltaAlgorithm {
    /// Copy/insert deltas found by longest-match search over a suffix array of the base.
    #[default]
    Suffix,
    /// zstd compression of the target using the base as a raw-content dictionary.
    Zstd,
}

impl DeltaAlgorithm {
    /// Stable identifier written into serialized maps.
    pub const fn id(self) -> u8 {
        match self {
            DeltaAlgorithm::Suffix => 1,
            DeltaAlgorithm::Zstd => 2,
        }
    }

    /// Inverse of [`DeltaAlgorithm::id`].
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(DeltaAlgorithm::Suffix),
            2 => Some(DeltaAlgorithm::Zstd),
            _ => None,
        }
    }
}

impl fmt::Display for DeltaAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaAlgorithm::Suffix => f.write_str("suffix"),
            DeltaAlgorithm::Zstd => f.write_str("zstd"),
        }
    }
}

/// Temporal store configuration.
///
/// # Validation Rules
///
/// - `max_chain_length` must be 1-1024
/// - `compression_level` must be 1-22 (zstd valid range)
///
/// # Example
///
/// ```no_run
/// # use rewind_types::config::{DeltaAlgorithm, StoreConfig};
/// let config = StoreConfig::builder()
///     .max_chain_length(16)
///     .delta_algorithm(DeltaAlgorithm::Zstd)
///     .build()
///     .expect("valid store config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    /// Maximum number of diff frames chained to one keyframe.
    ///
    /// Longer chains store less but make point-in-time reads replay more deltas.
    #[serde(default = "default_max_chain_length")]
    pub max_chain_length: usize,
    /// Delta algorithm for diff frames.
    #[serde(default)]
    pub delta_algorithm: DeltaAlgorithm,
    /// Compression level when `delta_algorithm` is `zstd` (1-22, 3 recommended).
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

#[bon::bon]
impl StoreConfig {
    /// Creates a new store configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if:
    /// - `max_chain_length` outside 1-1024
    /// - `compression_level` outside 1-22
    #[builder]
    pub fn new(
        #[builder(default = default_max_chain_length())] max_chain_length: usize,
        #[builder(default)] delta_algorithm: DeltaAlgorithm,
        #[builder(default = default_compression_level())] compression_level: i32,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_chain_length, delta_algorithm, compression_level };
        config.validate()?;
        Ok(config)
    }
}

impl StoreConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CHAIN_LENGTH..=MAX_CHAIN_LENGTH).contains(&self.max_chain_length) {
            return Err(ConfigError::Validation {
                message: format!(
                    "max_chain_length must be {}-{}, got {}",
                    MIN_CHAIN_LENGTH, MAX_CHAIN_LENGTH, self.max_chain_length
                ),
            });
        }
        if self.compression_level < MIN_COMPRESSION_LEVEL
            || self.compression_level > MAX_COMPRESSION_LEVEL
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "compression_level must be {}-{}, got {}",
                    MIN_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL, self.compression_level
                ),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_chain_length: default_max_chain_length(),
            delta_algorithm: DeltaAlgorithm::default(),
            compression_level: default_compression_level(),
        }
    }
}

fn default_max_chain_length() -> usize {
    10
}

fn default_compression_level() -> i32 {
    3 // Good balance of speed/ratio
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults_are_valid() {
        let config = StoreConfig::builder().build().expect("defaults should be valid");
        assert_eq!(config.max_chain_length, 10);
        assert_eq!(config.delta_algorithm, DeltaAlgorithm::Suffix);
        assert_eq!(config.compression_level, 3);
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_store_config_builder_with_custom_values() {
        let config = StoreConfig::builder()
            .max_chain_length(32)
            .delta_algorithm(DeltaAlgorithm::Zstd)
            .compression_level(9)
            .build()
            .expect("valid custom config");
        assert_eq!(config.max_chain_length, 32);
        assert_eq!(config.delta_algorithm, DeltaAlgorithm::Zstd);
        assert_eq!(config.compression_level, 9);
    }

    #[test]
    fn test_store_config_chain_length_bounds() {
        assert!(StoreConfig::builder().max_chain_length(1).build().is_ok());
        assert!(StoreConfig::builder().max_chain_length(1024).build().is_ok());

        let err = StoreConfig::builder().max_chain_length(0).build().unwrap_err();
        assert!(err.to_string().contains("max_chain_length"));
        assert!(StoreConfig::builder().max_chain_length(1025).build().is_err());
    }

    #[test]
    fn test_store_config_compression_level_bounds() {
        assert!(StoreConfig::builder().compression_level(0).build().is_err());
        assert!(StoreConfig::builder().compression_level(23).build().is_err());
        let err = StoreConfig::builder().compression_level(-5).build().unwrap_err();
        assert!(err.to_string().contains("compression_level"));
    }

    #[test]
    fn test_store_config_serde_defaults() {
        let config: StoreConfig = serde_json::from_str("{}").expect("empty object");
        assert_eq!(config, StoreConfig::default());

        let config: StoreConfig =
            serde_json::from_str(r#"{"delta_algorithm":"zstd","max_chain_length":4}"#)
                .expect("partial object");
        assert_eq!(config.delta_algorithm, DeltaAlgorithm::Zstd);
        assert_eq!(config.max_chain_length, 4);
        assert_eq!(config.compression_level, 3);
    }

    #[test]
    fn test_store_config_validate_after_deserialize() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"max_chain_length":0}"#).expect("deserializes");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delta_algorithm_id_roundtrip() {
        for algorithm in [DeltaAlgorithm::Suffix, DeltaAlgorithm::Zstd] {
            assert_eq!(DeltaAlgorithm::from_id(algorithm.id()), Some(algorithm));
        }
        assert_eq!(DeltaAlgorithm::from_id(0), None);
    }

    #[test]
    fn test_store_config_json_schema_has_fields() {
        let schema = schemars::schema_for!(StoreConfig);
        let json = serde_json::to_string(&schema).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.get("title").and_then(|v| v.as_str()), Some("StoreConfig"));
        let props = value.get("properties").and_then(|v| v.as_object()).unwrap();
        assert!(props.contains_key("max_chain_length"));
        assert!(props.contains_key("delta_algorithm"));
        assert!(props.contains_key("compression_level"));
    }
}
