// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! What a busy-polling side does between two failed polls.

use std::time::Duration;

/// Idle policy between polls of a shared index or flag.
///
/// `Spin` is the default and does nothing at all between polls: no yield, no
/// `spin_loop` hint, no syscall. Sleeping even for a microsecond turns every
/// empty/full poll into a syscall and costs an order of magnitude of
/// throughput, so `Sleep` exists only as an explicit opt-in for comparison
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Re-read the shared field immediately.
    #[default]
    Spin,
    /// Sleep for the given duration between polls.
    Sleep(Duration),
}

impl WaitStrategy {
    /// Build a strategy from a microsecond count; zero means `Spin`.
    pub fn from_micros(micros: u64) -> Self {
        if micros == 0 {
            Self::Spin
        } else {
            Self::Sleep(Duration::from_micros(micros))
        }
    }

    /// Run one idle step.
    #[inline(always)]
    pub fn idle(&self) {
        if let Self::Sleep(duration) = self {
            std::thread::sleep(*duration);
        }
    }

    /// Whether this strategy ever leaves the CPU.
    pub fn sleeps(&self) -> bool {
        matches!(self, Self::Sleep(_))
    }
}

impl std::fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spin => write!(f, "spin"),
            Self::Sleep(d) => write!(f, "sleep({}us)", d.as_micros()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pure_spin() {
        assert_eq!(WaitStrategy::default(), WaitStrategy::Spin);
        assert!(!WaitStrategy::default().sleeps());
    }

    #[test]
    fn test_from_micros() {
        assert_eq!(WaitStrategy::from_micros(0), WaitStrategy::Spin);
        assert_eq!(
            WaitStrategy::from_micros(15),
            WaitStrategy::Sleep(Duration::from_micros(15))
        );
        assert_eq!(WaitStrategy::from_micros(15).to_string(), "sleep(15us)");
    }
}
