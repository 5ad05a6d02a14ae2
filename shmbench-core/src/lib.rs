// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmbench core library
//!
//! Shared memory regions, the busy-wait SPSC ring buffer, the one-slot
//! request/reply mailbox with its event statistics table, the run state
//! machine and run configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod shm;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use config::{BenchConfig, ConfigLoader, SUPPORTED_CAPACITIES};
pub use error::{
    BenchError, BenchResult, HardValidationError, SharedMemoryError, StateTransitionError,
};
pub use events::{EventError, EventStats, EventTable, Outcome};
pub use shm::{
    Consumer, Mailbox, MailboxClient, MailboxServer, Producer, Request, RingBuffer,
    SharedRegion, WaitStrategy,
};
pub use state::{Role, RunState, RunStateMachine};
pub use types::{EventId, RegionName};
