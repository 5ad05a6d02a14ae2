// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmbench bb-client` command - attach to the ring and fill it.

use shmbench_benchmark::{run_producer, with_capacity, RunKind, RunReport, ThroughputReport};
use shmbench_core::{RingBuffer, SharedRegion};

use crate::settings::RunOptions;
use crate::shutdown::{run_blocking, stop_on_ctrl_c};

/// Value every transferred item carries.
const ITEM_VALUE: i32 = 1;

pub async fn execute(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    with_capacity!(
        options.capacity,
        N => produce::<N>(options).await,
        other => Err(format!("unsupported capacity {}", other).into())
    )
}

async fn produce<const N: usize>(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        region = %options.region,
        capacity = N,
        count = options.count,
        wait = %options.wait,
        "Starting bounded buffer client"
    );

    let region = match SharedRegion::attach(&options.region) {
        Ok(region) => region,
        Err(e) => {
            eprintln!("Can't open shared memory region.");
            return Err(e.into());
        }
    };
    println!("Opened shared memory region \"{}\".", options.region);

    let mut producer = RingBuffer::<N>::attach(region)?.with_wait(options.wait);

    let count = options.count;
    let stop = stop_on_ctrl_c();
    let (producer, result) = run_blocking(move || {
        let result = run_producer(&mut producer, count, ITEM_VALUE, &stop);
        (producer, result)
    })
    .await?;
    let report = result?;
    let total = producer.ring().running_total();

    print_report(&report, total);

    super::save_report(
        options.report_dir.as_deref(),
        &RunReport::new(RunKind::BbProducer, options.region.as_str(), options.wait)
            .with_capacity(N)
            .with_throughput(report)
            .with_running_total(total)
            .with_metadata("item_value", ITEM_VALUE),
    );
    Ok(())
}

fn print_report(report: &ThroughputReport, total: i64) {
    for line in report.elapsed_lines() {
        println!("{}", line);
    }
    println!("Total sum is: {}.", total);
    println!("Total number of round completed are {}.", report.count);
    println!("Throughput is {:.6} MB/second", report.throughput_mbps);
}
