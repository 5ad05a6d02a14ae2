// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmbench measurement layer
//!
//! Times transfers over the shared memory transports in `shmbench-core` and
//! turns them into reports.
//!
//! # Pieces
//!
//! - **Harness**: start/stop bracketing, with a drain-confirmed stop for
//!   the producer
//! - **Aggregation**: consumer-side running total, count and CRC32
//! - **Run loops**: producer, consumer and mailbox round-trip drivers
//! - **Reports**: throughput and round-trip metrics, saved as JSON

pub mod aggregate;
pub mod harness;
pub mod metrics;
pub mod reporter;
pub mod run;

pub use aggregate::{AggregateError, Aggregator};
pub use harness::ThroughputHarness;
pub use metrics::{RoundTripReport, RunKind, RunReport, SystemInfo, ThroughputReport};
pub use reporter::{JsonReporter, ReporterError};
pub use run::{run_consumer, run_producer, run_round_trips, RunError};
