// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory IPC module.
//!
//! POSIX shared memory regions plus the two layouts placed in them: the
//! busy-wait SPSC ring buffer and the one-slot request/reply mailbox.

mod mailbox;
mod placement;
mod region;
mod ring_buffer;
mod wait;

pub use mailbox::{
    Mailbox, MailboxClient, MailboxLayout, MailboxServer, Operation, Request, MAILBOX_DATA_LEN,
};
pub use region::SharedRegion;
pub use ring_buffer::{
    BenchRing, Consumer, Item, Producer, RingBuffer, RingLayout, DEFAULT_CAPACITY, ITEM_SIZE,
};
pub use wait::WaitStrategy;
