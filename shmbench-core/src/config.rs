// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML run configuration with strict validation.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Any invalid field results in a HardValidationError before a region is
//! created or attached.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BenchError, BenchResult, HardValidationError};
use crate::shm::{WaitStrategy, DEFAULT_CAPACITY};
use crate::types::RegionName;

/// Slot counts the command line can instantiate a ring for.
pub const SUPPORTED_CAPACITIES: [usize; 6] = [2, 16, 256, 997, 1024, DEFAULT_CAPACITY];

/// Longest accepted sleep between polls (1 second).
const MAX_SLEEP_US: u64 = 1_000_000;

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    region: Option<String>,
    #[serde(default = "default_count")]
    count: u64,
    #[serde(default = "default_capacity")]
    capacity: usize,
    #[serde(default)]
    sleep_us: u64,
    #[serde(default)]
    report_dir: Option<String>,
}

fn default_count() -> u64 {
    1_000_000
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            region: None,
            count: default_count(),
            capacity: default_capacity(),
            sleep_us: 0,
            report_dir: None,
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Region to create/attach; the command line may supply it instead.
    pub region: Option<RegionName>,
    /// Items (bb) or round trips (shmem) per run.
    pub count: u64,
    /// Ring slot count, one of [`SUPPORTED_CAPACITIES`].
    pub capacity: usize,
    /// Idle policy between polls.
    pub wait: WaitStrategy,
    /// Where JSON run reports go, if anywhere.
    pub report_dir: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            region: None,
            count: default_count(),
            capacity: default_capacity(),
            wait: WaitStrategy::Spin,
            report_dir: None,
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<BenchConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<BenchConfig> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> BenchResult<BenchConfig> {
        let region = raw.region.map(RegionName::new).transpose()?;

        if raw.count == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "count",
                value: raw.count.to_string(),
                reason: "Must transfer at least one item".to_string(),
            }
            .into());
        }

        Self::validate_capacity(raw.capacity)?;

        if raw.sleep_us > MAX_SLEEP_US {
            return Err(HardValidationError::InvalidFieldValue {
                field: "sleep_us",
                value: raw.sleep_us.to_string(),
                reason: format!("Must not exceed {} microseconds", MAX_SLEEP_US),
            }
            .into());
        }

        Ok(BenchConfig {
            region,
            count: raw.count,
            capacity: raw.capacity,
            wait: WaitStrategy::from_micros(raw.sleep_us),
            report_dir: raw.report_dir.map(PathBuf::from),
        })
    }

    /// Check a slot count against [`SUPPORTED_CAPACITIES`].
    pub fn validate_capacity(capacity: usize) -> Result<usize, HardValidationError> {
        if !SUPPORTED_CAPACITIES.contains(&capacity) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "capacity",
                value: capacity.to_string(),
                reason: format!("Must be one of {:?}", SUPPORTED_CAPACITIES),
            });
        }
        Ok(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ConfigLoader::load_string("").unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.wait, WaitStrategy::Spin);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
region: agandhi-shared-region
count: 5000
capacity: 16
sleep_us: 15
report_dir: /tmp/shmbench
"#;
        let config = ConfigLoader::load_string(yaml).unwrap();
        assert_eq!(
            config.region.as_ref().map(RegionName::as_str),
            Some("/agandhi-shared-region")
        );
        assert_eq!(config.count, 5000);
        assert_eq!(config.capacity, 16);
        assert!(config.wait.sleeps());
        assert_eq!(config.report_dir, Some(PathBuf::from("/tmp/shmbench")));
    }

    #[test]
    fn test_rejects_zero_count() {
        let err = ConfigLoader::load_string("count: 0").unwrap_err();
        assert!(matches!(
            err,
            BenchError::HardValidation(HardValidationError::InvalidFieldValue {
                field: "count",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_unsupported_capacity() {
        assert!(ConfigLoader::load_string("capacity: 3").is_err());
        assert!(ConfigLoader::load_string("capacity: 997").is_ok());
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(matches!(
            ConfigLoader::load_string("cout: 5"),
            Err(BenchError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_region_name() {
        assert!(matches!(
            ConfigLoader::load_string("region: a/b"),
            Err(BenchError::HardValidation(
                HardValidationError::InvalidRegionName { .. }
            ))
        ));
    }
}
