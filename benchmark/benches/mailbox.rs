// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Mailbox round-trip latency against a server thread over a real region.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shmbench_core::events::serve;
use shmbench_core::{EventId, EventTable, Mailbox, RegionName, Request, SharedRegion};

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("mailbox");
    group.measurement_time(Duration::from_secs(5));

    let name = RegionName::new(format!("bench-mailbox-{}", std::process::id()))
        .expect("Invalid region name");
    let owner =
        SharedRegion::create(&name, Mailbox::region_size()).expect("Failed to create SHM region");
    let mut server = Mailbox::create(owner).expect("Failed to create mailbox");
    let mut client = Mailbox::attach(SharedRegion::attach(&name).expect("Failed to attach"))
        .expect("Failed to attach mailbox");

    let stop = Arc::new(AtomicBool::new(false));
    let server_stop = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        let mut table = EventTable::new();
        serve(&mut server, &mut table, &server_stop, |_| {})
    });

    let id = EventId::new(1).expect("Invalid event id");
    client
        .call(&Request::register(id, "Installation", "InstallationFailed"))
        .expect("Register failed");

    let report = Request::report(id);
    group.bench_function("report_round_trip", |b| {
        b.iter(|| client.call(black_box(&report)).expect("Report failed"));
    });

    group.finish();
    stop.store(true, Ordering::Relaxed);
    handle.join().expect("Server panicked");
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
