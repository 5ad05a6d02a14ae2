// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod bb_client;
pub mod bb_server;
pub mod destroy;
pub mod shmem_client;
pub mod shmem_server;
pub mod validate;

use std::path::Path;

use shmbench_benchmark::{JsonReporter, RunReport};

/// Save `report` if a report directory was configured. A failed save is
/// logged, not fatal: the run itself already succeeded.
fn save_report(dir: Option<&Path>, report: &RunReport) {
    let Some(dir) = dir else {
        return;
    };
    match JsonReporter::new(dir).and_then(|reporter| reporter.save(report)) {
        Ok(path) => println!("Report saved to {}", path.display()),
        Err(e) => tracing::error!(dir = %dir.display(), error = %e, "Failed to save run report"),
    }
}
