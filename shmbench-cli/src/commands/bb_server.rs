// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmbench bb-server` command - create the ring and drain it.
//!
//! The server owns the region: it is created here and unlinked when the
//! consumer handle drops, on a budget, on Ctrl+C, or on error.

use shmbench_benchmark::{run_consumer, with_capacity, Aggregator, RunKind, RunReport};
use shmbench_core::{RingBuffer, SharedRegion};

use crate::settings::RunOptions;
use crate::shutdown::{run_blocking, stop_on_ctrl_c};

pub async fn execute(
    options: RunOptions,
    budget: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    with_capacity!(
        options.capacity,
        N => serve::<N>(options, budget).await,
        other => Err(format!("unsupported capacity {}", other).into())
    )
}

async fn serve<const N: usize>(
    options: RunOptions,
    budget: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        region = %options.region,
        capacity = N,
        wait = %options.wait,
        "Starting bounded buffer server"
    );

    let region = match SharedRegion::create(&options.region, RingBuffer::<N>::region_size()) {
        Ok(region) => region,
        Err(e) => {
            eprintln!("Can't create shared memory region.");
            return Err(e.into());
        }
    };
    println!("Created shared memory region \"{}\".", options.region);

    let mut consumer = RingBuffer::<N>::create(region)?.with_wait(options.wait);

    println!("Draining; press Ctrl+C to stop...");
    let stop = stop_on_ctrl_c();
    let (consumer, aggregator, result) = run_blocking(move || {
        let mut aggregator = Aggregator::new();
        let result = run_consumer(&mut consumer, budget, &stop, &mut aggregator);
        (consumer, aggregator, result)
    })
    .await?;
    let report = result?;

    let total = consumer.running_total();
    println!("Total sum is: {}.", total);
    println!("Total number of items drained are {}.", aggregator.count());
    println!("Stream checksum is {:#010x}.", aggregator.checksum());

    super::save_report(
        options.report_dir.as_deref(),
        &RunReport::new(RunKind::BbConsumer, options.region.as_str(), options.wait)
            .with_capacity(N)
            .with_throughput(report)
            .with_running_total(total)
            .with_metadata("checksum", aggregator.checksum()),
    );

    drop(consumer);
    println!("Removed shared memory region \"{}\".", options.region);
    Ok(())
}
