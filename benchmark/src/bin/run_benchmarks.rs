// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Capacity sweep: runs producer and consumer on two threads over a real
//! shared memory region for every supported slot count, then the mailbox
//! experiment, and saves one JSON report per run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context};
use clap::Parser;
use shmbench_benchmark::{
    run_consumer, run_producer, run_round_trips, with_capacity, Aggregator, JsonReporter,
    RoundTripReport, RunKind, RunReport, ThroughputReport,
};
use shmbench_core::events::serve;
use shmbench_core::{
    EventTable, Mailbox, RegionName, RingBuffer, SharedRegion, WaitStrategy, SUPPORTED_CAPACITIES,
};

#[derive(Parser)]
#[command(name = "run_benchmarks")]
#[command(about = "Sweep shmbench over every ring capacity and save JSON reports")]
struct Args {
    /// Output directory for report files
    #[arg(short, long, default_value = "data")]
    output: PathBuf,

    /// Items per bounded-buffer run
    #[arg(short, long, default_value_t = 1_000_000)]
    count: u64,

    /// Round trips for the mailbox experiment
    #[arg(long, default_value_t = 100_000)]
    round_trips: u64,

    /// Capacities to run (all supported if not specified)
    #[arg(long, value_delimiter = ',')]
    capacity: Option<Vec<usize>>,

    /// Run in quick mode (fewer items)
    #[arg(long)]
    quick: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let count = if args.quick { 10_000 } else { args.count };
    let round_trips = if args.quick { 1_000 } else { args.round_trips };
    let capacities = args
        .capacity
        .unwrap_or_else(|| SUPPORTED_CAPACITIES.to_vec());

    println!("shmbench capacity sweep");
    println!("=======================");
    println!("Output directory: {:?}", args.output);
    println!("Items per run: {}", count);
    println!();

    let reporter = JsonReporter::new(&args.output)?;
    let previous = previous_best(&reporter)?;
    let mut summary = Vec::new();

    for capacity in capacities {
        let (throughput, total) = with_capacity!(
            capacity,
            N => sweep_one::<N>(count)?,
            other => bail!(
                "unsupported capacity {}, expected one of {:?}",
                other,
                SUPPORTED_CAPACITIES
            )
        );
        let report = RunReport::new(
            RunKind::BbProducer,
            sweep_region("bb", capacity),
            WaitStrategy::Spin,
        )
        .with_capacity(capacity)
        .with_throughput(throughput.clone())
        .with_running_total(total);
        reporter.save(&report)?;
        println!("  ✓ capacity {}", capacity);
        summary.push((capacity, throughput));
    }

    let rt = run_mailbox(round_trips)?;
    let report = RunReport::new(
        RunKind::Mailbox,
        sweep_region("mailbox", 0),
        WaitStrategy::Spin,
    )
    .with_round_trip(rt.clone());
    reporter.save(&report)?;
    println!("  ✓ mailbox");

    println!();
    println!("Summary");
    println!("-------");
    for (capacity, throughput) in &summary {
        let best = previous
            .get(capacity)
            .map(|bps| format!(" (previous best {})", ThroughputReport::format_bytes_per_sec(*bps)))
            .unwrap_or_default();
        println!(
            "capacity {:>8}: {}{}",
            capacity,
            ThroughputReport::format_bytes_per_sec(throughput.bytes_per_sec),
            best
        );
    }
    println!(
        "mailbox: {:.0} round-trips/second, {} average",
        rt.round_trips_per_sec,
        RoundTripReport::format_latency(rt.avg_round_trip_secs)
    );

    Ok(())
}

/// Best producer byte rate per capacity among the reports already in the
/// output directory. Unreadable files are skipped.
fn previous_best(reporter: &JsonReporter) -> anyhow::Result<HashMap<usize, f64>> {
    let mut best: HashMap<usize, f64> = HashMap::new();
    for path in reporter.list_reports()? {
        let report = match JsonReporter::load(&path) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("  skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if report.kind != RunKind::BbProducer {
            continue;
        }
        let (Some(capacity), Some(throughput)) = (report.capacity, report.throughput) else {
            continue;
        };
        if !throughput.bytes_per_sec.is_finite() {
            continue;
        }
        let entry = best.entry(capacity).or_insert(throughput.bytes_per_sec);
        *entry = entry.max(throughput.bytes_per_sec);
    }
    Ok(best)
}

fn sweep_region(tag: &str, capacity: usize) -> String {
    format!("shmbench-sweep-{}-{}-{}", tag, capacity, std::process::id())
}

/// One producer/consumer run; returns the producer's report and the ring's
/// running total.
fn sweep_one<const N: usize>(count: u64) -> anyhow::Result<(ThroughputReport, i64)> {
    let name = RegionName::new(sweep_region("bb", N))?;
    let owner = SharedRegion::create(&name, RingBuffer::<N>::region_size())
        .context("creating sweep region")?;
    let mut consumer = RingBuffer::<N>::create(owner)?;
    let mut producer = RingBuffer::<N>::attach(SharedRegion::attach(&name)?)?;

    let stop = Arc::new(AtomicBool::new(false));
    let consumer_stop = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        let mut aggregator = Aggregator::new();
        run_consumer(&mut consumer, Some(count), &consumer_stop, &mut aggregator)
            .map(|_| aggregator)
    });

    let report = run_producer(&mut producer, count, 1, &stop);
    stop.store(true, Ordering::Relaxed);
    let report = report?;
    let aggregator = match handle.join() {
        Ok(result) => result?,
        Err(_) => bail!("consumer thread panicked"),
    };
    aggregator.verify_constant(count, 1)?;
    Ok((report, producer.ring().running_total()))
}

fn run_mailbox(round_trips: u64) -> anyhow::Result<RoundTripReport> {
    let name = RegionName::new(sweep_region("mailbox", 0))?;
    let owner = SharedRegion::create(&name, Mailbox::region_size())?;
    let mut server = Mailbox::create(owner)?;
    let mut client = Mailbox::attach(SharedRegion::attach(&name)?)?;

    let stop = Arc::new(AtomicBool::new(false));
    let server_stop = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        let mut table = EventTable::new();
        serve(&mut server, &mut table, &server_stop, |_| {})
    });

    let result = run_round_trips(&mut client, round_trips, &stop);
    stop.store(true, Ordering::Relaxed);
    if handle.join().is_err() {
        bail!("mailbox server thread panicked");
    }
    Ok(result?)
}
