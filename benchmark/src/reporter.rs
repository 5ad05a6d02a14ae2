// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! JSON report files for runs.
//!
//! Each run is saved to its own timestamped file so repeated runs against
//! different capacities can be compared later.

use crate::metrics::RunReport;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to access report directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Failed to parse report {path}: {source}")]
    Deserialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON reporter for run results.
#[derive(Debug)]
pub struct JsonReporter {
    /// Output directory for report files
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a new JSON reporter with the specified output directory.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReporterError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save a run report to `<kind>_<timestamp>_<pid>.json`.
    ///
    /// Returns the path to the created file.
    pub fn save(&self, report: &RunReport) -> Result<PathBuf, ReporterError> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%S%.3fZ");
        let filename = format!("{}_{}_{}.json", report.kind, timestamp, std::process::id());
        let filepath = self.output_dir.join(&filename);

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report).map_err(ReporterError::Serialization)?;

        tracing::info!(path = %filepath.display(), "Saved run report");
        Ok(filepath)
    }

    /// List all existing report files in the output directory.
    pub fn list_reports(&self) -> Result<Vec<PathBuf>, ReporterError> {
        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }

    /// Load an existing run report from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<RunReport, ReporterError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            ReporterError::Deserialization {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{RoundTripReport, RunKind, ThroughputReport};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_reporter_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        let report = RunReport::new(RunKind::BbProducer, "/agandhi-shared-region", "spin")
            .with_capacity(16)
            .with_throughput(ThroughputReport::calculate(1000, 4, Duration::from_millis(2)))
            .with_running_total(1000);

        let path = reporter.save(&report).unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("bb_producer_"));

        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.kind, RunKind::BbProducer);
        assert_eq!(loaded.capacity, Some(16));
        assert_eq!(loaded.running_total, Some(1000));
        assert_eq!(loaded.throughput.unwrap().count, 1000);
    }

    #[test]
    fn test_zero_elapsed_report_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        let report = RunReport::new(RunKind::BbConsumer, "/bb", "spin")
            .with_throughput(ThroughputReport::calculate(10, 4, Duration::ZERO))
            .with_round_trip(RoundTripReport::new(0, Duration::ZERO));
        let path = reporter.save(&report).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"throughput_mbps\": null"));

        let loaded = JsonReporter::load(&path).unwrap();
        let throughput = loaded.throughput.unwrap();
        assert_eq!(throughput.count, 10);
        assert_eq!(throughput.elapsed_ns, 0);
        assert!(throughput.throughput_mbps.is_nan());
        assert!(throughput.items_per_sec.is_nan());
        assert!(loaded.round_trip.unwrap().round_trips_per_sec.is_nan());
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        match JsonReporter::load(&path) {
            Err(ReporterError::Deserialization { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("unexpected result {:?}", other.map(|r| r.kind)),
        }
    }

    #[test]
    fn test_list_reports() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path().join("nested")).unwrap();
        assert!(reporter.list_reports().unwrap().is_empty());

        let report = RunReport::new(RunKind::Mailbox, "/mbox", "spin")
            .with_round_trip(RoundTripReport::new(10, Duration::from_micros(20)));
        reporter.save(&report).unwrap();
        std::fs::write(reporter.output_dir().join("notes.txt"), "x").unwrap();

        let reports = reporter.list_reports().unwrap();
        assert_eq!(reports.len(), 1);
    }
}
