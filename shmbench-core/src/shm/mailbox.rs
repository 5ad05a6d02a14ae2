// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! One-slot request/reply mailbox in shared memory.
//!
//! Protocol, single writer per step:
//! - the client waits until `operation == 0`, writes `event_id` and `data`,
//!   then writes `operation` last;
//! - the server waits until `operation != 0`, performs the action, then
//!   clears `operation` last.
//!
//! Same weak-consistency assumption as the ring buffer: volatile whole-word
//! accesses, no fences.

use std::num::NonZeroI32;
use std::ptr::{self, addr_of_mut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SharedMemoryError;
use crate::shm::placement::{Placement, SharedLayout};
use crate::shm::{SharedRegion, WaitStrategy};
use crate::types::EventId;

/// Bytes in the data field, including the terminating NUL.
pub const MAILBOX_DATA_LEN: usize = 100;

/// The structure that lives in shared memory.
#[repr(C)]
pub struct MailboxLayout {
    /// 0 = idle, otherwise an [`Operation`] code.
    operation: i32,
    event_id: i32,
    /// NUL-terminated payload.
    data: [u8; MAILBOX_DATA_LEN],
}

// SAFETY: repr(C), integers only.
unsafe impl SharedLayout for MailboxLayout {}

/// Requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Register an event type; data is `"<name> <description>"`.
    Register,
    /// Count one occurrence of an event type.
    Report,
    /// Zero an event type's counter.
    Reset,
    /// Any other non-zero code.
    Unknown(i32),
}

impl Operation {
    pub const fn code(&self) -> i32 {
        match self {
            Self::Register => 1,
            Self::Report => 2,
            Self::Reset => 3,
            Self::Unknown(code) => *code,
        }
    }

    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Register,
            2 => Self::Report,
            3 => Self::Reset,
            other => Self::Unknown(other),
        }
    }
}

/// A request as seen on either side of the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Never `Unknown(0)`: every constructor yields a non-zero code.
    operation: Operation,
    event_id: i32,
    data: String,
}

impl Request {
    /// Register `id` with a one-word name and a description.
    pub fn register(id: EventId, name: &str, description: &str) -> Self {
        Self {
            operation: Operation::Register,
            event_id: id.index() as i32,
            data: format!("{} {}", name, description),
        }
    }

    /// Report one occurrence of `id`.
    pub fn report(id: EventId) -> Self {
        Self {
            operation: Operation::Report,
            event_id: id.index() as i32,
            data: String::new(),
        }
    }

    /// Reset the counter of `id`.
    pub fn reset(id: EventId) -> Self {
        Self {
            operation: Operation::Reset,
            event_id: id.index() as i32,
            data: String::new(),
        }
    }

    /// Arbitrary request, unvalidated. Used to exercise the server with
    /// codes and ids no well-behaved client sends.
    pub fn raw(operation: NonZeroI32, event_id: i32, data: impl Into<String>) -> Self {
        Self {
            operation: Operation::from_code(operation.get()),
            event_id,
            data: data.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

/// A mailbox mapped into this process.
pub struct Mailbox {
    layout: Placement<MailboxLayout>,
}

impl Mailbox {
    /// Exact region size needed to hold one mailbox.
    pub const fn region_size() -> usize {
        std::mem::size_of::<MailboxLayout>()
    }

    /// Initialize a mailbox inside a freshly created region and become its
    /// server.
    pub fn create(region: SharedRegion) -> Result<MailboxServer, SharedMemoryError> {
        let mailbox = Self {
            layout: Placement::in_region(region)?,
        };
        // SAFETY: aligned word inside the layout-checked region
        unsafe { ptr::write_volatile(mailbox.operation_ptr(), 0) };
        Ok(MailboxServer::new(Arc::new(mailbox)))
    }

    /// Map a mailbox another process initialized and become its client.
    pub fn attach(region: SharedRegion) -> Result<MailboxClient, SharedMemoryError> {
        let mailbox = Self {
            layout: Placement::in_region(region)?,
        };
        Ok(MailboxClient::new(Arc::new(mailbox)))
    }

    /// A zeroed mailbox on the heap, for in-process runs and tests.
    pub fn in_memory() -> Self {
        Self {
            layout: Placement::zeroed(),
        }
    }

    /// Hand out both roles over a heap mailbox.
    pub fn split(self) -> (MailboxClient, MailboxServer) {
        let mailbox = Arc::new(self);
        (
            MailboxClient::new(Arc::clone(&mailbox)),
            MailboxServer::new(mailbox),
        )
    }

    fn operation_ptr(&self) -> *mut i32 {
        // SAFETY: layout points at a live MailboxLayout
        unsafe { addr_of_mut!((*self.layout.as_ptr()).operation) }
    }

    fn event_id_ptr(&self) -> *mut i32 {
        // SAFETY: layout points at a live MailboxLayout
        unsafe { addr_of_mut!((*self.layout.as_ptr()).event_id) }
    }

    fn data_ptr(&self) -> *mut [u8; MAILBOX_DATA_LEN] {
        // SAFETY: layout points at a live MailboxLayout
        unsafe { addr_of_mut!((*self.layout.as_ptr()).data) }
    }

    /// Pending operation code, 0 when idle.
    #[inline(always)]
    pub fn operation(&self) -> i32 {
        // SAFETY: aligned word inside the live layout
        unsafe { ptr::read_volatile(self.operation_ptr()) }
    }

    /// No request is pending.
    pub fn is_idle(&self) -> bool {
        self.operation() == 0
    }

    /// The region backing this mailbox, if it is not heap allocated.
    pub fn region(&self) -> Option<&SharedRegion> {
        self.layout.region()
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("operation", &self.operation())
            .field("region", &self.region())
            .finish()
    }
}

/// Client side: writes `event_id` and `data`, sets `operation`.
#[derive(Debug)]
pub struct MailboxClient {
    mailbox: Arc<Mailbox>,
    wait: WaitStrategy,
}

impl MailboxClient {
    fn new(mailbox: Arc<Mailbox>) -> Self {
        Self {
            mailbox,
            wait: WaitStrategy::default(),
        }
    }

    /// Set the idle policy used while waiting for the server.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Poll until the server has cleared the previous request.
    pub fn wait_idle(&self) {
        while !self.mailbox.is_idle() {
            self.wait.idle();
        }
    }

    /// Poll until the server has finished the request just submitted.
    pub fn wait_complete(&self) {
        self.wait_idle();
    }

    /// [`wait_idle`](Self::wait_idle) that gives up with `false` once `stop`
    /// is raised.
    pub fn wait_idle_until(&self, stop: &AtomicBool) -> bool {
        while !self.mailbox.is_idle() {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            self.wait.idle();
        }
        true
    }

    /// Publish a request. The mailbox must be idle; `operation` is written
    /// after every other field.
    pub fn submit(&mut self, request: &Request) -> Result<(), SharedMemoryError> {
        let bytes = request.data.as_bytes();
        if bytes.len() >= MAILBOX_DATA_LEN {
            return Err(SharedMemoryError::PayloadTooLarge {
                size: bytes.len(),
                max: MAILBOX_DATA_LEN - 1,
            });
        }

        let mut data = [0u8; MAILBOX_DATA_LEN];
        data[..bytes.len()].copy_from_slice(bytes);

        // SAFETY: fields inside the live layout; the server does not read
        // them until operation becomes non-zero, which happens last.
        unsafe {
            ptr::write_volatile(self.mailbox.event_id_ptr(), request.event_id);
            ptr::write_volatile(self.mailbox.data_ptr(), data);
            ptr::write_volatile(self.mailbox.operation_ptr(), request.operation.code());
        }
        Ok(())
    }

    /// Wait for idle, submit, wait for completion.
    pub fn call(&mut self, request: &Request) -> Result<(), SharedMemoryError> {
        self.wait_idle();
        self.submit(request)?;
        self.wait_complete();
        Ok(())
    }

    /// [`call`](Self::call) that gives up once `stop` is raised. Returns
    /// `false` if the request was not completed.
    pub fn call_until(
        &mut self,
        request: &Request,
        stop: &AtomicBool,
    ) -> Result<bool, SharedMemoryError> {
        if !self.wait_idle_until(stop) {
            return Ok(false);
        }
        self.submit(request)?;
        Ok(self.wait_idle_until(stop))
    }

    /// Read-only view of the mailbox.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

/// Server side: reads a pending request, clears `operation` when done.
#[derive(Debug)]
pub struct MailboxServer {
    mailbox: Arc<Mailbox>,
    wait: WaitStrategy,
}

impl MailboxServer {
    fn new(mailbox: Arc<Mailbox>) -> Self {
        Self {
            mailbox,
            wait: WaitStrategy::default(),
        }
    }

    /// Set the idle policy used while waiting for a request.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// The pending request, if any. Does not complete it.
    pub fn poll(&self) -> Option<Request> {
        let code = NonZeroI32::new(self.mailbox.operation())?;

        // SAFETY: operation was non-zero, so the client finished writing
        // event_id and data before it and will not touch them until cleared.
        let (event_id, data) = unsafe {
            (
                ptr::read_volatile(self.mailbox.event_id_ptr()),
                ptr::read_volatile(self.mailbox.data_ptr()),
            )
        };
        let end = data.iter().position(|&b| b == 0).unwrap_or(MAILBOX_DATA_LEN);

        Some(Request {
            operation: Operation::from_code(code.get()),
            event_id,
            data: String::from_utf8_lossy(&data[..end]).into_owned(),
        })
    }

    /// Poll until a request arrives or `stop` is raised.
    pub fn wait_request(&self, stop: &AtomicBool) -> Option<Request> {
        loop {
            if let Some(request) = self.poll() {
                return Some(request);
            }
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            self.wait.idle();
        }
    }

    /// Mark the pending request done; `operation` is the last store.
    pub fn complete(&mut self) {
        // SAFETY: aligned word inside the live layout
        unsafe { ptr::write_volatile(self.mailbox.operation_ptr(), 0) };
    }

    /// Read-only view of the mailbox.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}
