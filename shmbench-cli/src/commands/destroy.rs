// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmbench destroy` command - remove a region left behind by a killed
//! server.

use shmbench_core::{RegionName, SharedRegion};

pub async fn execute(region: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = RegionName::new(region)?;
    tracing::info!(region = %name, "Removing shared memory region");

    SharedRegion::destroy(&name)?;
    println!("Removed shared memory region \"{}\".", name);
    Ok(())
}
