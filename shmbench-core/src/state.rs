// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Run state machine shared by both sides of a transfer.
//!
//! Idle → Running → (per item: WaitForSlot → Transfer) → Draining → Stopped.
//! `Stopped` is terminal and only reachable through `Draining`. A stop
//! request while waiting for a slot goes straight to `Draining`.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;

/// Which side of the transport a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Run lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Attached, clock not started.
    Idle,
    /// Clock started, no item in flight.
    Running,
    /// Polling for a free slot (producer) or a full one (consumer).
    WaitForSlot,
    /// Moving one item.
    Transfer,
    /// Last item handed over, waiting for it to be consumed.
    Draining,
    /// Clock stopped.
    Stopped,
}

impl RunState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::WaitForSlot => "WaitForSlot",
            Self::Transfer => "Transfer",
            Self::Draining => "Draining",
            Self::Stopped => "Stopped",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: RunState) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Running) |
            // Per item
            (Self::Running, Self::WaitForSlot) |
            (Self::WaitForSlot, Self::Transfer) |
            (Self::Transfer, Self::WaitForSlot) |
            // Wind down (an empty run drains straight from Running, an
            // interrupted one from WaitForSlot)
            (Self::Running, Self::Draining) |
            (Self::WaitForSlot, Self::Draining) |
            (Self::Transfer, Self::Draining) |
            (Self::Draining, Self::Stopped)
        )
    }

    /// States that are logged; per-item states are too hot to trace.
    const fn is_phase(&self) -> bool {
        !matches!(self, Self::WaitForSlot | Self::Transfer)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for one side of a run.
#[derive(Debug)]
pub struct RunStateMachine {
    role: Role,
    current_state: RunState,
    last_phase_change: Instant,
    transfers: u64,
}

impl RunStateMachine {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            current_state: RunState::Idle,
            last_phase_change: Instant::now(),
            transfers: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.current_state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Completed `Transfer` entries.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn is_stopped(&self) -> bool {
        self.current_state == RunState::Stopped
    }

    /// Attempt to transition to a new state.
    #[inline]
    pub fn transition_to(&mut self, target: RunState) -> Result<(), StateTransitionError> {
        if self.current_state == RunState::Stopped {
            return Err(StateTransitionError::AlreadyStopped {
                role: self.role.name(),
            });
        }
        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                role: self.role.name(),
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        if target == RunState::Transfer {
            self.transfers += 1;
        }
        if target.is_phase() {
            tracing::debug!(
                role = %self.role,
                from = self.current_state.name(),
                to = target.name(),
                transfers = self.transfers,
                in_previous_ms = self.last_phase_change.elapsed().as_millis() as u64,
                "Run phase change"
            );
            self.last_phase_change = Instant::now();
        }

        self.current_state = target;
        Ok(())
    }
}
