// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Wall-clock bracketing of a transfer loop.
//!
//! The clock starts right before the first transfer. The producer stops it
//! only after the consumer has drained the last item; the consumer stops it
//! when its loop ends.

use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use shmbench_core::Producer;

use crate::metrics::{RoundTripReport, ThroughputReport};

/// Monotonic start/stop timer for one run.
#[derive(Debug, Default)]
pub struct ThroughputHarness {
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl ThroughputHarness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start timestamp. Calling it again restarts the clock.
    pub fn start(&mut self) {
        self.elapsed = None;
        self.started = Some(Instant::now());
    }

    /// Record the end timestamp and return the elapsed time. Without a prior
    /// [`start`](Self::start) the elapsed time is zero.
    pub fn stop(&mut self) -> Duration {
        let elapsed = self
            .started
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.elapsed = Some(elapsed);
        elapsed
    }

    /// Wait until every pushed item has been consumed, then [`stop`](Self::stop).
    ///
    /// Returns `None` if `stop` is raised before the ring drains; the clock
    /// keeps running in that case.
    pub fn stop_after_drain<const N: usize>(
        &mut self,
        producer: &Producer<N>,
        stop: &AtomicBool,
    ) -> Option<Duration> {
        if !producer.wait_drained_until(stop) {
            return None;
        }
        Some(self.stop())
    }

    /// Elapsed time of the last completed measurement.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Throughput for `count` items of `bytes_per_item` over the measured
    /// interval (zero if the clock never stopped).
    pub fn report(&self, count: u64, bytes_per_item: usize) -> ThroughputReport {
        ThroughputReport::calculate(count, bytes_per_item, self.elapsed.unwrap_or_default())
    }

    /// Round-trip rate over the measured interval.
    pub fn round_trip_report(&self, round_trips: u64) -> RoundTripReport {
        RoundTripReport::new(round_trips, self.elapsed.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmbench_core::RingBuffer;
    use std::thread;

    #[test]
    fn test_stop_without_start_is_zero() {
        let mut harness = ThroughputHarness::new();
        assert_eq!(harness.stop(), Duration::ZERO);
        assert!(harness.report(10, 4).throughput_mbps.is_infinite());
    }

    #[test]
    fn test_start_stop_measures_interval() {
        let mut harness = ThroughputHarness::new();
        harness.start();
        thread::sleep(Duration::from_millis(5));
        let elapsed = harness.stop();
        assert!(elapsed >= Duration::from_millis(5));
        assert_eq!(harness.elapsed(), Some(elapsed));
    }

    #[test]
    fn test_stop_after_drain_waits_for_consumer() {
        let (mut tx, mut rx) = RingBuffer::<4>::in_memory().unwrap().split();
        let stop = AtomicBool::new(false);
        let mut harness = ThroughputHarness::new();

        harness.start();
        tx.push_blocking(1);
        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            rx.pop_blocking()
        });

        let elapsed = harness.stop_after_drain(&tx, &stop).unwrap();
        assert!(elapsed >= Duration::from_millis(10));
        assert_eq!(consumer.join().unwrap(), 1);
        assert!(tx.ring().is_empty());
    }

    #[test]
    fn test_stop_after_drain_gives_up_on_stop() {
        let (mut tx, _rx) = RingBuffer::<4>::in_memory().unwrap().split();
        tx.push_blocking(1);
        let stop = AtomicBool::new(true);
        let mut harness = ThroughputHarness::new();
        harness.start();
        assert!(harness.stop_after_drain(&tx, &stop).is_none());
        assert!(harness.elapsed().is_none());
    }
}
