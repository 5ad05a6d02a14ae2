// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Result types for throughput runs.
//!
//! Everything here is serializable so a run can be written out by the
//! [`JsonReporter`](crate::JsonReporter) and reloaded later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use sysinfo::System;

/// Which experiment produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Bounded buffer, producer side
    BbProducer,
    /// Bounded buffer, consumer side
    BbConsumer,
    /// Mailbox request/reply experiment
    Mailbox,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunKind::BbProducer => write!(f, "bb_producer"),
            RunKind::BbConsumer => write!(f, "bb_consumer"),
            RunKind::Mailbox => write!(f, "mailbox"),
        }
    }
}

/// The four "Elapsed time: ..." console lines, from seconds down to
/// nanoseconds.
pub fn elapsed_lines(seconds: f64) -> [String; 4] {
    [
        format!("Elapsed time: {:.6} seconds", seconds),
        format!("Elapsed time: {:.6} milliseconds", seconds * 1e3),
        format!("Elapsed time: {:.6} microseconds", seconds * 1e6),
        format!("Elapsed time: {:.6} nanoseconds", seconds * 1e9),
    ]
}

/// serde_json writes non-finite floats as `null`; read those back as `NaN`.
fn rate_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Throughput of one bulk transfer.
///
/// With a zero elapsed time the rates are `+inf` (or `NaN` when nothing
/// moved) instead of a panic. serde_json writes both as `null`, which loads
/// back as `NaN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputReport {
    /// Items transferred
    pub count: u64,
    /// Bytes per item
    pub bytes_per_item: usize,
    /// Wall-clock duration in nanoseconds
    pub elapsed_ns: u64,
    /// Wall-clock duration in seconds
    pub elapsed_seconds: f64,
    /// Items per second
    #[serde(deserialize_with = "rate_or_nan")]
    pub items_per_sec: f64,
    /// Bytes per second
    #[serde(deserialize_with = "rate_or_nan")]
    pub bytes_per_sec: f64,
    /// Decimal megabytes per second
    #[serde(deserialize_with = "rate_or_nan")]
    pub throughput_mbps: f64,
}

impl ThroughputReport {
    /// Calculate throughput from item count, item size and duration.
    pub fn calculate(count: u64, bytes_per_item: usize, elapsed: Duration) -> Self {
        let elapsed_seconds = elapsed.as_secs_f64();
        let bytes = count as f64 * bytes_per_item as f64;
        Self {
            count,
            bytes_per_item,
            elapsed_ns: elapsed.as_nanos() as u64,
            elapsed_seconds,
            items_per_sec: count as f64 / elapsed_seconds,
            bytes_per_sec: bytes / elapsed_seconds,
            throughput_mbps: bytes / 1_000_000.0 / elapsed_seconds,
        }
    }

    /// Console lines for the elapsed time, see [`elapsed_lines`].
    pub fn elapsed_lines(&self) -> [String; 4] {
        elapsed_lines(self.elapsed_seconds)
    }

    /// Format a byte rate in human-readable form.
    pub fn format_bytes_per_sec(bps: f64) -> String {
        if !bps.is_finite() {
            format!("{} B/s", bps)
        } else if bps < 1_000.0 {
            format!("{:.2} B/s", bps)
        } else if bps < 1_000_000.0 {
            format!("{:.2} KB/s", bps / 1_000.0)
        } else if bps < 1_000_000_000.0 {
            format!("{:.2} MB/s", bps / 1_000_000.0)
        } else {
            format!("{:.2} GB/s", bps / 1_000_000_000.0)
        }
    }
}

/// Rate of a request/reply experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTripReport {
    /// Completed round trips
    pub round_trips: u64,
    /// Wall-clock duration in nanoseconds
    pub elapsed_ns: u64,
    /// Wall-clock duration in seconds
    pub elapsed_seconds: f64,
    /// Round trips per second
    #[serde(deserialize_with = "rate_or_nan")]
    pub round_trips_per_sec: f64,
    /// Mean seconds per round trip
    #[serde(deserialize_with = "rate_or_nan")]
    pub avg_round_trip_secs: f64,
}

impl RoundTripReport {
    /// Same zero guard as [`ThroughputReport::calculate`].
    pub fn new(round_trips: u64, elapsed: Duration) -> Self {
        let elapsed_seconds = elapsed.as_secs_f64();
        Self {
            round_trips,
            elapsed_ns: elapsed.as_nanos() as u64,
            elapsed_seconds,
            round_trips_per_sec: round_trips as f64 / elapsed_seconds,
            avg_round_trip_secs: elapsed_seconds / round_trips as f64,
        }
    }

    /// Format a per-operation latency (auto-selects ns/μs/ms/s).
    pub fn format_latency(seconds: f64) -> String {
        let ns = seconds * 1e9;
        if !ns.is_finite() {
            format!("{}", seconds)
        } else if ns < 1_000.0 {
            format!("{:.0}ns", ns)
        } else if ns < 1_000_000.0 {
            format!("{:.2}μs", ns / 1_000.0)
        } else if ns < 1_000_000_000.0 {
            format!("{:.2}ms", ns / 1_000_000.0)
        } else {
            format!("{:.2}s", seconds)
        }
    }
}

/// System information captured at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// OS version
    pub os_version: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    /// CPU model name
    pub cpu_model: String,
    /// Number of CPU cores
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    /// Hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// One run with everything needed to compare it against others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Suite identifier
    pub benchmark_suite: String,
    /// Tool version
    pub version: String,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Host the run happened on
    pub system_info: SystemInfo,
    /// Experiment
    pub kind: RunKind,
    /// Shared memory region name
    pub region: String,
    /// Ring slot count (bounded buffer runs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// Idle policy used while polling
    pub wait: String,
    /// Bulk transfer result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<ThroughputReport>,
    /// Request/reply result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip: Option<RoundTripReport>,
    /// Running total read back from the ring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_total: Option<i64>,
    /// Additional run-specific values
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RunReport {
    /// Create a report for a run against `region`.
    pub fn new(kind: RunKind, region: impl Into<String>, wait: impl ToString) -> Self {
        Self {
            benchmark_suite: "shmbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            kind,
            region: region.into(),
            capacity: None,
            wait: wait.to_string(),
            throughput: None,
            round_trip: None,
            running_total: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_throughput(mut self, report: ThroughputReport) -> Self {
        self.throughput = Some(report);
        self
    }

    pub fn with_round_trip(mut self, report: RoundTripReport) -> Self {
        self.round_trip = Some(report);
        self
    }

    pub fn with_running_total(mut self, total: i64) -> Self {
        self.running_total = Some(total);
        self
    }

    /// Add metadata to the report. Values that fail to serialize are skipped.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.metadata.insert(key.into(), value);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unserializable metadata"),
        }
        self
    }
}
