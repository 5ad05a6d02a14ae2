// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Merge of the YAML configuration with command line overrides.

use std::path::{Path, PathBuf};

use shmbench_core::{
    BenchConfig, BenchResult, ConfigLoader, HardValidationError, RegionName, WaitStrategy,
};

use crate::RunArgs;

/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "shmbench.yaml";

/// Load the explicit config file, else `shmbench.yaml` if present, else
/// defaults. An explicit path that doesn't exist is an error.
pub fn load(path: Option<&Path>) -> BenchResult<BenchConfig> {
    match path {
        Some(path) => ConfigLoader::load_file(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            tracing::debug!(file = DEFAULT_CONFIG_FILE, "Using configuration file");
            ConfigLoader::load_file(DEFAULT_CONFIG_FILE)
        }
        None => Ok(BenchConfig::default()),
    }
}

/// Fully resolved settings for one command.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub region: RegionName,
    pub count: u64,
    pub capacity: usize,
    pub wait: WaitStrategy,
    pub report_dir: Option<PathBuf>,
}

impl RunOptions {
    /// Command line values win over the configuration file.
    pub fn resolve(
        config: &BenchConfig,
        region: Option<String>,
        count: Option<u64>,
        capacity: Option<usize>,
        run: &RunArgs,
    ) -> BenchResult<Self> {
        let region = match region {
            Some(name) => RegionName::new(name)?,
            None => config
                .region
                .clone()
                .ok_or(HardValidationError::InvalidRegionName {
                    name: String::new(),
                    reason: "No region given on the command line or in the config".to_string(),
                })?,
        };

        let count = count.unwrap_or(config.count);
        if count == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "count",
                value: count.to_string(),
                reason: "Must transfer at least one item".to_string(),
            }
            .into());
        }

        let capacity = match capacity {
            Some(capacity) => ConfigLoader::validate_capacity(capacity)?,
            None => config.capacity,
        };

        let wait = run
            .sleep_us
            .map(WaitStrategy::from_micros)
            .unwrap_or(config.wait);

        Ok(Self {
            region,
            count,
            capacity,
            wait,
            report_dir: run.report_dir.clone().or_else(|| config.report_dir.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmbench_core::BenchError;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_config() {
        let config = ConfigLoader::load_string(
            "region: from-config\ncount: 10\ncapacity: 16\nsleep_us: 5\n",
        )
        .unwrap();
        let run = RunArgs {
            sleep_us: Some(0),
            report_dir: None,
        };

        let options =
            RunOptions::resolve(&config, Some("from-flag".into()), Some(99), Some(1024), &run)
                .unwrap();
        assert_eq!(options.region.as_str(), "/from-flag");
        assert_eq!(options.count, 99);
        assert_eq!(options.capacity, 1024);
        assert_eq!(options.wait, WaitStrategy::Spin);
    }

    #[test]
    fn test_config_fills_missing_flags() {
        let config = ConfigLoader::load_string("region: from-config\nsleep_us: 5\n").unwrap();
        let options = RunOptions::resolve(&config, None, None, None, &RunArgs::default()).unwrap();
        assert_eq!(options.region.as_str(), "/from-config");
        assert_eq!(options.count, 1_000_000);
        assert!(options.wait.sleeps());
    }

    #[test]
    fn test_missing_region_is_rejected() {
        let err = RunOptions::resolve(
            &BenchConfig::default(),
            None,
            None,
            None,
            &RunArgs::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BenchError::HardValidation(HardValidationError::InvalidRegionName { .. })
        ));
    }

    #[test]
    fn test_bad_capacity_flag_is_rejected() {
        assert!(RunOptions::resolve(
            &BenchConfig::default(),
            Some("r".into()),
            None,
            Some(17),
            &RunArgs::default(),
        )
        .is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load(Some(dir.path().join("nope.yaml").as_path())),
            Err(BenchError::ConfigNotFound { .. })
        ));
    }
}
