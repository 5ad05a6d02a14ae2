// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmbench shmem-server` command - serve event statistics over a mailbox.

use shmbench_core::events::serve;
use shmbench_core::{EventTable, Mailbox, Outcome, SharedRegion};

use crate::settings::RunOptions;
use crate::shutdown::{run_blocking, stop_on_ctrl_c};

pub async fn execute(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(region = %options.region, wait = %options.wait, "Starting mailbox server");

    let region = match SharedRegion::create(&options.region, Mailbox::region_size()) {
        Ok(region) => region,
        Err(e) => {
            eprintln!("Can't create shared memory region.");
            return Err(e.into());
        }
    };
    println!("Created shared memory region \"{}\".", options.region);

    let mut server = Mailbox::create(region)?.with_wait(options.wait);

    println!("Serving requests; press Ctrl+C to stop...");
    let stop = stop_on_ctrl_c();
    let (server, table, handled) = run_blocking(move || {
        let mut table = EventTable::new();
        let handled = serve(&mut server, &mut table, &stop, print_outcome);
        (server, table, handled)
    })
    .await?;

    println!("Final event statistics...");
    print!("{}", table.render());
    tracing::info!(handled, "Mailbox server stopped");

    drop(server);
    println!("All done!");
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Registered { id } => println!("Registered new event type: ID={}", id),
        Outcome::Reset { id, snapshot } => {
            print!("{}", snapshot);
            println!("Reset statistics for event type {}", id);
        }
        Outcome::Reported { .. } | Outcome::Ignored(_) => {}
    }
}
