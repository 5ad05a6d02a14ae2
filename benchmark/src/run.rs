// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Driver loops for each side of an experiment.
//!
//! These are blocking busy-wait loops. Every one takes a process-local stop
//! flag so an interrupt can end it and let the region guards drop.

use std::sync::atomic::AtomicBool;

use shmbench_core::shm::{Item, ITEM_SIZE};
use shmbench_core::{
    Consumer, EventId, HardValidationError, MailboxClient, Producer, Request, Role, RunState,
    RunStateMachine, SharedMemoryError, StateTransitionError,
};
use thiserror::Error;

use crate::aggregate::Aggregator;
use crate::harness::ThroughputHarness;
use crate::metrics::{RoundTripReport, ThroughputReport};

/// Bind the const slot count for a runtime capacity from
/// [`SUPPORTED_CAPACITIES`](shmbench_core::SUPPORTED_CAPACITIES) and
/// evaluate `$body` with it; any other value evaluates `$fallback`.
///
/// ```ignore
/// with_capacity!(capacity, N => sweep::<N>(count), other => bail!("bad {other}"))
/// ```
#[macro_export]
macro_rules! with_capacity {
    ($capacity:expr, $n:ident => $body:expr, $other:pat => $fallback:expr) => {
        match $capacity {
            2 => {
                const $n: usize = 2;
                $body
            }
            16 => {
                const $n: usize = 16;
                $body
            }
            256 => {
                const $n: usize = 256;
                $body
            }
            997 => {
                const $n: usize = 997;
                $body
            }
            1024 => {
                const $n: usize = 1024;
                $body
            }
            1_048_576 => {
                const $n: usize = 1_048_576;
                $body
            }
            $other => $fallback,
        }
    };
}

/// Event id the mailbox experiment registers and reports.
pub const EXPERIMENT_EVENT_ID: i64 = 1;

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("interrupted after {completed} of {requested} transfers")]
    Interrupted { completed: u64, requested: u64 },

    #[error("Invalid run state transition: {0}")]
    StateTransition(#[from] StateTransitionError),

    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    #[error("Validation error: {0}")]
    Validation(#[from] HardValidationError),
}

/// Push `count` copies of `value`, then wait for the consumer to drain them.
///
/// The clock covers the first push through the confirmed drain of the last
/// item.
pub fn run_producer<const N: usize>(
    producer: &mut Producer<N>,
    count: u64,
    value: Item,
    stop: &AtomicBool,
) -> Result<ThroughputReport, RunError> {
    let mut sm = RunStateMachine::new(Role::Producer);
    let mut harness = ThroughputHarness::new();

    sm.transition_to(RunState::Running)?;
    tracing::debug!(capacity = N, count, wait = %producer.wait_strategy(), "Producer starting");
    harness.start();

    for sent in 0..count {
        sm.transition_to(RunState::WaitForSlot)?;
        if !producer.push_until(value, stop) {
            return Err(RunError::Interrupted {
                completed: sent,
                requested: count,
            });
        }
        sm.transition_to(RunState::Transfer)?;
    }

    sm.transition_to(RunState::Draining)?;
    if harness.stop_after_drain(producer, stop).is_none() {
        return Err(RunError::Interrupted {
            completed: count,
            requested: count,
        });
    }
    sm.transition_to(RunState::Stopped)?;

    let report = harness.report(sm.transfers(), ITEM_SIZE);
    tracing::debug!(
        count = report.count,
        elapsed_ns = report.elapsed_ns,
        mbps = report.throughput_mbps,
        "Producer finished"
    );
    Ok(report)
}

/// Drain items into `aggregator` until `budget` items arrived or `stop` is
/// raised. An interrupt is a normal way to end the consumer.
///
/// The clock starts when the first item is resident, so time spent waiting
/// for a producer to attach is not measured.
pub fn run_consumer<const N: usize>(
    consumer: &mut Consumer<N>,
    budget: Option<u64>,
    stop: &AtomicBool,
    aggregator: &mut Aggregator,
) -> Result<ThroughputReport, RunError> {
    let mut sm = RunStateMachine::new(Role::Consumer);
    let mut harness = ThroughputHarness::new();

    sm.transition_to(RunState::Running)?;
    tracing::debug!(capacity = N, wait = %consumer.wait_strategy(), "Consumer waiting for data");
    if budget != Some(0) && consumer.wait_ready_until(stop) {
        harness.start();
    }

    while budget.map_or(true, |budget| sm.transfers() < budget) {
        sm.transition_to(RunState::WaitForSlot)?;
        let Some(item) = consumer.pop_until(stop) else {
            break;
        };
        sm.transition_to(RunState::Transfer)?;
        aggregator.record(item);
    }

    sm.transition_to(RunState::Draining)?;
    harness.stop();
    sm.transition_to(RunState::Stopped)?;

    let report = harness.report(aggregator.count(), ITEM_SIZE);
    tracing::debug!(
        count = report.count,
        total = aggregator.running_total(),
        "Consumer finished"
    );
    Ok(report)
}

/// The mailbox experiment: register the test event, time `count` reports,
/// then ask the server to print and reset its table.
///
/// The final reset is outside the timed interval.
pub fn run_round_trips(
    client: &mut MailboxClient,
    count: u64,
    stop: &AtomicBool,
) -> Result<RoundTripReport, RunError> {
    let id = EventId::new(EXPERIMENT_EVENT_ID)?;
    let mut harness = ThroughputHarness::new();

    let interrupted = |completed| RunError::Interrupted {
        completed,
        requested: count,
    };

    let register = Request::register(id, "Installation", "InstallationFailed");
    if !client.call_until(&register, stop)? {
        return Err(interrupted(0));
    }

    let report = Request::report(id);
    harness.start();
    for done in 0..count {
        if !client.call_until(&report, stop)? {
            return Err(interrupted(done));
        }
    }
    harness.stop();

    if !client.call_until(&Request::reset(id), stop)? {
        return Err(interrupted(count));
    }
    Ok(harness.round_trip_report(count))
}
