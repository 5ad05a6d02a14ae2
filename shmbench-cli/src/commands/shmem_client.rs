// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmbench shmem-client` command - send mailbox requests.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use shmbench_benchmark::metrics::elapsed_lines;
use shmbench_benchmark::{run_round_trips, RoundTripReport, RunKind, RunReport};
use shmbench_core::{EventId, Mailbox, MailboxClient, Request, SharedRegion};

use crate::settings::RunOptions;
use crate::shutdown::{run_blocking, stop_on_ctrl_c};
use crate::MailboxAction;

pub async fn execute(
    options: RunOptions,
    action: MailboxAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let region = match SharedRegion::attach(&options.region) {
        Ok(region) => region,
        Err(e) => {
            eprintln!("Can't open shared memory region.");
            return Err(e.into());
        }
    };
    println!("Opened shared memory region \"{}\".", options.region);

    let client = Mailbox::attach(region)?.with_wait(options.wait);

    let request = match action {
        MailboxAction::Register {
            id,
            name,
            description,
        } => {
            let id = EventId::new(id)?;
            println!(
                "Registering event type {} with name {} and description {}",
                id, name, description
            );
            Request::register(id, &name, &description)
        }
        MailboxAction::Report { id } => {
            let id = EventId::new(id)?;
            println!("Reporting occurrence of event type {}", id);
            Request::report(id)
        }
        MailboxAction::Reset { id } => {
            let id = EventId::new(id)?;
            println!("Resetting statistics for event type {}", id);
            Request::reset(id)
        }
        MailboxAction::Experiment { .. } => return experiment(client, options).await,
    };

    let stop = stop_on_ctrl_c();
    send(client, request, stop).await
}

/// One request: wait for the mailbox to be free, publish, wait for the
/// server to finish. Ctrl+C abandons the wait.
async fn send(
    mut client: MailboxClient,
    request: Request,
    stop: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Waiting until shared memory is not busy.");
    let done = run_blocking(move || client.call_until(&request, &stop)).await??;

    if !done {
        return Err("interrupted before the server completed the request".into());
    }
    println!("All done!");
    Ok(())
}

async fn experiment(
    mut client: MailboxClient,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = options.count;
    tracing::info!(region = %options.region, count, "Starting round-trip experiment");

    let stop = stop_on_ctrl_c();
    let report = run_blocking(move || run_round_trips(&mut client, count, &stop)).await??;

    print_report(&report);

    super::save_report(
        options.report_dir.as_deref(),
        &RunReport::new(RunKind::Mailbox, options.region.as_str(), options.wait)
            .with_round_trip(report),
    );
    println!("All done!");
    Ok(())
}

fn print_report(report: &RoundTripReport) {
    for line in elapsed_lines(report.elapsed_seconds) {
        println!("{}", line);
    }
    println!(
        "Total number of round trips completed are {}.",
        report.round_trips
    );
    println!(
        "Throughput is {:.6} round-trips/second",
        report.round_trips_per_sec
    );
    println!(
        "Average round trip time is {:.6} seconds.",
        report.avg_round_trip_secs
    );
}
