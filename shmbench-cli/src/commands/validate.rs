// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmbench validate` command - check a configuration file.

use std::path::Path;

use shmbench_core::ConfigLoader;

pub async fn execute(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file.display(), "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!(
                "  Region:      {}",
                config
                    .region
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "(from command line)".to_string())
            );
            println!("  Count:       {}", config.count);
            println!("  Capacity:    {} slots", config.capacity);
            println!("  Wait:        {}", config.wait);
            match &config.report_dir {
                Some(dir) => println!("  Report Dir:  {}", dir.display()),
                None => println!("  Report Dir:  (none)"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
