// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Event statistics served over the mailbox.
//!
//! The server owns one [`EventTable`] for its whole lifetime and passes it
//! into [`serve`] by reference.

use std::fmt::Write as _;
use std::sync::atomic::AtomicBool;

use thiserror::Error;

use crate::shm::{MailboxServer, Operation, Request};
use crate::types::MAX_EVENT_TYPES;

/// Longest event name the table stores.
pub const MAX_NAME_LEN: usize = 15;

/// Longest event description the table stores.
pub const MAX_DESCRIPTION_LEN: usize = 63;

/// Rejected event table operations. Logged by the server, never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("can't use event ID {id}: must be in 0..{max}")]
    InvalidEventId { id: i32, max: usize },

    #[error("can't register event ID {id}, data is missing space separator")]
    MissingSeparator { id: i32 },

    #[error("can't register event ID {id}, {field} is longer than {max} characters")]
    TextTooLong {
        id: i32,
        field: &'static str,
        max: usize,
    },

    #[error("unknown operation {code}")]
    UnknownOperation { code: i32 },
}

/// Statistics for one event type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    pub name: Option<String>,
    pub description: Option<String>,
    pub count: u64,
}

impl EventStats {
    pub fn is_registered(&self) -> bool {
        self.name.is_some()
    }
}

/// What a dispatched request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Registered { id: usize },
    Reported { id: usize, count: u64 },
    /// Table as it was right before the counter was zeroed.
    Reset { id: usize, snapshot: String },
    Ignored(EventError),
}

/// Table of every event type, indexed by id.
#[derive(Debug, Clone)]
pub struct EventTable {
    entries: Vec<EventStats>,
}

impl EventTable {
    pub fn new() -> Self {
        Self {
            entries: vec![EventStats::default(); MAX_EVENT_TYPES],
        }
    }

    fn index(id: i32) -> Result<usize, EventError> {
        usize::try_from(id)
            .ok()
            .filter(|&i| i < MAX_EVENT_TYPES)
            .ok_or(EventError::InvalidEventId {
                id,
                max: MAX_EVENT_TYPES,
            })
    }

    /// Set name and description from `"<name> <description>"`, split at the
    /// first space. Re-registering replaces the text and keeps the count.
    ///
    /// Names over [`MAX_NAME_LEN`] and descriptions over
    /// [`MAX_DESCRIPTION_LEN`] characters are rejected.
    pub fn register(&mut self, id: i32, data: &str) -> Result<usize, EventError> {
        let index = Self::index(id)?;
        let (name, description) = data
            .split_once(' ')
            .ok_or(EventError::MissingSeparator { id })?;

        let check = |field, text: &str, max| {
            if text.chars().count() > max {
                Err(EventError::TextTooLong { id, field, max })
            } else {
                Ok(())
            }
        };
        check("name", name, MAX_NAME_LEN)?;
        check("description", description, MAX_DESCRIPTION_LEN)?;

        let entry = &mut self.entries[index];
        entry.name = Some(name.to_string());
        entry.description = Some(description.to_string());

        tracing::info!(
            id = index,
            name = %name,
            description = %description,
            "Registered new event type"
        );
        Ok(index)
    }

    /// Count one occurrence. Unregistered ids are counted too; they just
    /// don't show up in [`render`](Self::render).
    pub fn report(&mut self, id: i32) -> Result<u64, EventError> {
        let index = Self::index(id)?;
        let entry = &mut self.entries[index];
        entry.count += 1;
        Ok(entry.count)
    }

    /// Zero the counter of `id`.
    pub fn reset(&mut self, id: i32) -> Result<usize, EventError> {
        let index = Self::index(id)?;
        self.entries[index].count = 0;
        Ok(index)
    }

    pub fn get(&self, id: usize) -> Option<&EventStats> {
        self.entries.get(id)
    }

    /// Registered entries with their ids.
    pub fn registered(&self) -> impl Iterator<Item = (usize, &EventStats)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_registered())
    }

    /// Fixed-width table of registered events.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:>4} {:>15} {:>63} {:>10}\n",
            "ID", "Name", "Description", "Count"
        );
        for (id, entry) in self.registered() {
            let _ = writeln!(
                out,
                "{:>4} {:>15} {:>63} {:>10}",
                id,
                entry.name.as_deref().unwrap_or_default(),
                entry.description.as_deref().unwrap_or_default(),
                entry.count
            );
        }
        out
    }

    /// Apply one request to the table.
    pub fn dispatch(&mut self, request: &Request) -> Outcome {
        let id = request.event_id();
        let result = match request.operation() {
            Operation::Register => self
                .register(id, request.data())
                .map(|id| Outcome::Registered { id }),
            Operation::Report => Self::index(id).and_then(|index| {
                self.report(id)
                    .map(|count| Outcome::Reported { id: index, count })
            }),
            Operation::Reset => {
                let snapshot = self.render();
                self.reset(id).map(|id| Outcome::Reset { id, snapshot })
            }
            Operation::Unknown(code) => Err(EventError::UnknownOperation { code }),
        };

        result.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "Ignoring request");
            Outcome::Ignored(error)
        })
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve requests until `stop` is raised. Every request is completed, even
/// the ignored ones, so a client never waits forever on a bad opcode.
///
/// Returns the number of requests handled.
pub fn serve<F>(
    server: &mut MailboxServer,
    table: &mut EventTable,
    stop: &AtomicBool,
    mut on_outcome: F,
) -> u64
where
    F: FnMut(&Outcome),
{
    let mut handled = 0;
    while let Some(request) = server.wait_request(stop) {
        let outcome = table.dispatch(&request);
        on_outcome(&outcome);
        server.complete();
        handled += 1;
    }
    tracing::debug!(handled, "Mailbox server stopped");
    handled
}
