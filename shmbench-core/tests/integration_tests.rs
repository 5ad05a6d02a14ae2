// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests over real POSIX shared memory regions.
//!
//! Each test uses its own pid-suffixed region name so parallel test
//! binaries never collide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shmbench_core::events::serve;
use shmbench_core::{
    ConfigLoader, Consumer, EventId, EventTable, Mailbox, MailboxClient, MailboxServer, Outcome,
    Producer, RegionName, Request, RingBuffer, SharedMemoryError, SharedRegion, WaitStrategy,
};
use tempfile::TempDir;

fn region_name(tag: &str) -> RegionName {
    RegionName::new(format!("shmbench-it-{}-{}", tag, std::process::id()))
        .expect("valid region name")
}

#[test]
fn test_ring_transfer_between_mappings() {
    const COUNT: i32 = 200_000;
    let name = region_name("ring");

    // Consumer creates and initializes, producer attaches separately.
    let owner = SharedRegion::create(&name, RingBuffer::<1024>::region_size())
        .expect("Failed to create region");
    let mut rx = RingBuffer::<1024>::create(owner).unwrap();

    let attached = SharedRegion::attach(&name).expect("Failed to attach region");
    assert!(!attached.is_owner());
    let mut tx = RingBuffer::<1024>::attach(attached).unwrap();

    let producer = std::thread::spawn(move || {
        for value in 0..COUNT {
            tx.push_blocking(value);
        }
        tx.wait_drained();
        tx.pushed()
    });

    for expected in 0..COUNT {
        assert_eq!(rx.pop_blocking(), expected, "FIFO order broken");
    }

    assert_eq!(producer.join().unwrap(), COUNT as u64);
    assert_eq!(rx.running_total(), (0..COUNT as i64).sum::<i64>());
    assert!(rx.ring().is_empty());

    drop(rx);
    assert!(matches!(
        SharedRegion::attach(&name),
        Err(SharedMemoryError::NotFound { .. })
    ));
}

#[test]
fn test_constant_stream_total() {
    const COUNT: u64 = 50_000;
    let name = region_name("const");

    let owner = SharedRegion::create(&name, RingBuffer::<16>::region_size()).unwrap();
    let mut rx = RingBuffer::<16>::create(owner).unwrap();
    let mut tx = RingBuffer::<16>::attach(SharedRegion::attach(&name).unwrap())
        .unwrap()
        .with_wait(WaitStrategy::Spin);

    let stop = Arc::new(AtomicBool::new(false));
    let consumer_stop = Arc::clone(&stop);
    let consumer = std::thread::spawn(move || {
        let mut seen = 0u64;
        while let Some(item) = rx.pop_until(&consumer_stop) {
            assert_eq!(item, 1);
            seen += 1;
        }
        (seen, rx.running_total())
    });

    for _ in 0..COUNT {
        tx.push_blocking(1);
    }
    tx.wait_drained();
    stop.store(true, Ordering::Relaxed);

    let (seen, total) = consumer.join().unwrap();
    assert_eq!(seen, COUNT);
    assert_eq!(total, COUNT as i64);
}

#[test]
fn test_mapping_roles_follow_ownership() {
    let name = region_name("roles");
    let owner = SharedRegion::create(&name, RingBuffer::<16>::region_size()).unwrap();

    // The creator can only consume, the attacher can only produce.
    let mut rx: Consumer<16> = RingBuffer::<16>::create(owner).unwrap();
    let mut tx: Producer<16> =
        RingBuffer::<16>::attach(SharedRegion::attach(&name).unwrap()).unwrap();
    assert!(rx.ring().region().unwrap().is_owner());
    assert!(!tx.ring().region().unwrap().is_owner());

    assert!(tx.try_push(9));
    assert_eq!(rx.try_pop(), Some(9));
    assert_eq!(tx.ring().running_total(), 9);

    let mailbox_name = region_name("roles-mailbox");
    let mailbox_owner = SharedRegion::create(&mailbox_name, Mailbox::region_size()).unwrap();
    let _server: MailboxServer = Mailbox::create(mailbox_owner).unwrap();
    let client: MailboxClient =
        Mailbox::attach(SharedRegion::attach(&mailbox_name).unwrap()).unwrap();
    assert!(client.mailbox().is_idle());
}

#[test]
fn test_attach_rejects_wrong_layout() {
    let name = region_name("mismatch");
    let _owner = SharedRegion::create(&name, RingBuffer::<16>::region_size()).unwrap();

    let attached = SharedRegion::attach(&name).unwrap();
    assert_eq!(attached.size(), RingBuffer::<16>::region_size());
    assert!(matches!(
        RingBuffer::<256>::attach(attached),
        Err(SharedMemoryError::LayoutMismatch { .. })
    ));
}

#[test]
fn test_create_twice_fails_until_destroyed() {
    let name = region_name("twice");
    let owner = SharedRegion::create(&name, Mailbox::region_size()).unwrap();
    assert!(matches!(
        SharedRegion::create(&name, Mailbox::region_size()),
        Err(SharedMemoryError::AlreadyExists { .. })
    ));

    SharedRegion::destroy(&name).unwrap();
    let again = SharedRegion::create(&name, Mailbox::region_size()).unwrap();
    drop(again);
    // The first owner unlinking an already-removed name is not an error.
    drop(owner);
}

#[test]
fn test_mailbox_experiment_over_region() {
    const REPORTS: u64 = 1_000;
    let name = region_name("mailbox");

    let owner = SharedRegion::create(&name, Mailbox::region_size()).unwrap();
    let mut server = Mailbox::create(owner).unwrap();
    let mut client = Mailbox::attach(SharedRegion::attach(&name).unwrap()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let server_stop = Arc::clone(&stop);
    let handle = std::thread::spawn(move || {
        let mut table = EventTable::new();
        let mut snapshots = Vec::new();
        let handled = serve(&mut server, &mut table, &server_stop, |outcome| {
            if let Outcome::Reset { snapshot, .. } = outcome {
                snapshots.push(snapshot.clone());
            }
        });
        (handled, table, snapshots)
    });

    let id = EventId::new(1).unwrap();
    client
        .call(&Request::register(id, "Installation", "InstallationFailed"))
        .unwrap();
    for _ in 0..REPORTS {
        client.call(&Request::report(id)).unwrap();
    }
    client.call(&Request::reset(id)).unwrap();
    stop.store(true, Ordering::Relaxed);

    let (handled, table, snapshots) = handle.join().unwrap();
    assert_eq!(handled, REPORTS + 2);
    assert_eq!(table.get(1).unwrap().count, 0);
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0]
        .lines()
        .nth(1)
        .unwrap()
        .trim_end()
        .ends_with(&REPORTS.to_string()));
}

#[test]
fn test_config_file_roundtrip() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("shmbench.yaml");
    std::fs::write(
        &path,
        "region: agandhi-shared-region\ncount: 100\ncapacity: 997\n",
    )
    .unwrap();

    let config = ConfigLoader::load_file(&path).unwrap();
    assert_eq!(config.count, 100);
    assert_eq!(config.capacity, 997);
    assert!(!config.wait.sleeps());

    assert!(ConfigLoader::load_file(dir.path().join("missing.yaml")).is_err());
}
