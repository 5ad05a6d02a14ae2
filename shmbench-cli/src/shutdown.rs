// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ctrl+C handling for the busy-wait loops.
//!
//! The loops run on blocking threads and poll a stop flag; Ctrl+C raises it
//! so they return normally and every region guard drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A stop flag raised by the first Ctrl+C.
pub fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        println!();
        tracing::info!("Interrupted, stopping");
        flag.store(true, Ordering::Relaxed);
    });
    stop
}

/// Run a busy-wait loop on the blocking pool.
pub async fn run_blocking<F, T>(f: F) -> Result<T, Box<dyn std::error::Error>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}
