// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Bounded circular buffer for busy-wait SPSC transfer between processes.
//!
//! # Memory model
//!
//! There are no atomics and no fences here. `head` is written only by the
//! [`Producer`], `tail` and `running_total` only by the [`Consumer`], and every
//! access to a shared field is a single volatile load or store of a naturally
//! aligned machine word. Volatile accesses are never elided or reordered
//! against each other by the compiler, and on TSO hardware (x86-64) stores
//! become visible to the other process in program order. That is the whole
//! synchronization story, and it is a weak-consistency assumption: on weakly
//! ordered CPUs (aarch64, POWER) a consumer could observe the new `head`
//! before the slot write. The benchmark measures exactly this mechanism, so
//! the assumption is kept rather than papered over with real atomics.
//!
//! # Capacity
//!
//! `N` slots, `N - 1` usable. Empty is `head == tail`; full is
//! `(head + 1) % N == tail`. One slot always stays unused so the two indices
//! alone tell empty from full.

use std::ptr::{self, addr_of, addr_of_mut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SharedMemoryError;
use crate::shm::placement::{Placement, SharedLayout};
use crate::shm::{SharedRegion, WaitStrategy};

/// One transferred item.
pub type Item = i32;

/// Bytes moved per item; used for throughput math.
pub const ITEM_SIZE: usize = std::mem::size_of::<Item>();

/// Slot count used by the command line benchmark (1M slots, 4 MiB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Ring buffer with the default slot count.
pub type BenchRing = RingBuffer<DEFAULT_CAPACITY>;

/// The structure that lives in shared memory.
///
/// Both processes map this exact type; it is the single definition of the
/// layout, so slot count and field offsets cannot drift apart.
#[repr(C)]
pub struct RingLayout<const N: usize> {
    /// Next slot the producer writes ("in").
    head: usize,
    /// Next slot the consumer reads ("out").
    tail: usize,
    slots: [Item; N],
    /// Sum of every drained item.
    running_total: i64,
}

// SAFETY: repr(C), integers only.
unsafe impl<const N: usize> SharedLayout for RingLayout<N> {}

/// A ring buffer mapped into this process.
///
/// Read-only inspection is available here; mutation only through the
/// [`Producer`] and [`Consumer`] handles. A shared mapping yields exactly one
/// of them: the creator consumes, the attacher produces.
pub struct RingBuffer<const N: usize> {
    layout: Placement<RingLayout<N>>,
}

impl<const N: usize> RingBuffer<N> {
    /// Number of physical slots.
    pub const CAPACITY: usize = N;

    /// Exact region size needed to hold one ring.
    pub const fn region_size() -> usize {
        std::mem::size_of::<RingLayout<N>>()
    }

    fn check_capacity() -> Result<(), SharedMemoryError> {
        if N < 2 {
            return Err(SharedMemoryError::InvalidCapacity { capacity: N });
        }
        Ok(())
    }

    /// Initialize a ring inside a freshly created region and become its
    /// consumer. The process that creates the region owns `tail` and
    /// `running_total`.
    pub fn create(region: SharedRegion) -> Result<Consumer<N>, SharedMemoryError> {
        Self::check_capacity()?;
        let ring = Self {
            layout: Placement::in_region(region)?,
        };

        // SAFETY: the creator runs before any producer attaches; the fields
        // are aligned words inside the layout-checked region.
        unsafe {
            ptr::write_volatile(ring.head_ptr(), 0);
            ptr::write_volatile(ring.tail_ptr(), 0);
            ptr::write_volatile(ring.total_ptr(), 0);
        }

        tracing::debug!(capacity = N, size = Self::region_size(), "Initialized ring buffer");
        Ok(Consumer::new(Arc::new(ring)))
    }

    /// Map a ring that another process initialized and become its producer.
    pub fn attach(region: SharedRegion) -> Result<Producer<N>, SharedMemoryError> {
        Self::check_capacity()?;
        let ring = Self {
            layout: Placement::in_region(region)?,
        };
        Ok(Producer::new(Arc::new(ring)))
    }

    /// A zeroed ring on the heap, for in-process runs and tests.
    pub fn in_memory() -> Result<Self, SharedMemoryError> {
        Self::check_capacity()?;
        Ok(Self {
            layout: Placement::zeroed(),
        })
    }

    /// Hand out both roles over a heap ring. Shared mappings only ever get
    /// one role each, from [`create`](Self::create) or
    /// [`attach`](Self::attach).
    pub fn split(self) -> (Producer<N>, Consumer<N>) {
        let ring = Arc::new(self);
        (Producer::new(Arc::clone(&ring)), Consumer::new(ring))
    }

    fn head_ptr(&self) -> *mut usize {
        // SAFETY: layout points at a live RingLayout<N>
        unsafe { addr_of_mut!((*self.layout.as_ptr()).head) }
    }

    fn tail_ptr(&self) -> *mut usize {
        // SAFETY: layout points at a live RingLayout<N>
        unsafe { addr_of_mut!((*self.layout.as_ptr()).tail) }
    }

    fn total_ptr(&self) -> *mut i64 {
        // SAFETY: layout points at a live RingLayout<N>
        unsafe { addr_of_mut!((*self.layout.as_ptr()).running_total) }
    }

    /// Pointer to slot `index`; caller guarantees `index < N`.
    fn slot_ptr(&self, index: usize) -> *mut Item {
        debug_assert!(index < N);
        // SAFETY: layout is live and index < N keeps us inside `slots`
        unsafe { (addr_of_mut!((*self.layout.as_ptr()).slots) as *mut Item).add(index) }
    }

    #[inline(always)]
    fn load_head(&self) -> usize {
        // SAFETY: aligned word inside the live layout
        unsafe { ptr::read_volatile(self.head_ptr()) }
    }

    #[inline(always)]
    fn load_tail(&self) -> usize {
        // SAFETY: aligned word inside the live layout
        unsafe { ptr::read_volatile(self.tail_ptr()) }
    }

    #[inline(always)]
    const fn advance(index: usize) -> usize {
        (index + 1) % N
    }

    /// Physical slot count.
    pub fn capacity(&self) -> usize {
        N
    }

    /// Items the buffer can hold at once (`capacity - 1`).
    pub fn usable_capacity(&self) -> usize {
        N - 1
    }

    /// Producer index as currently visible.
    pub fn head(&self) -> usize {
        self.load_head()
    }

    /// Consumer index as currently visible.
    pub fn tail(&self) -> usize {
        self.load_tail()
    }

    /// Items currently resident.
    pub fn len(&self) -> usize {
        (self.load_head() + N - self.load_tail()) % N
    }

    /// `head == tail`.
    pub fn is_empty(&self) -> bool {
        self.load_head() == self.load_tail()
    }

    /// Advancing `head` would land on `tail`.
    pub fn is_full(&self) -> bool {
        Self::advance(self.load_head()) == self.load_tail()
    }

    /// Sum of all items the consumer has drained so far.
    pub fn running_total(&self) -> i64 {
        // SAFETY: aligned word inside the live layout
        unsafe { ptr::read_volatile(addr_of!((*self.layout.as_ptr()).running_total)) }
    }

    /// The region backing this ring, if it is not heap allocated.
    pub fn region(&self) -> Option<&SharedRegion> {
        self.layout.region()
    }
}

impl<const N: usize> std::fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &N)
            .field("head", &self.load_head())
            .field("tail", &self.load_tail())
            .field("region", &self.region())
            .finish()
    }
}

/// Producer side of a ring: the only writer of `head` and of the slot it
/// points at.
pub struct Producer<const N: usize> {
    ring: Arc<RingBuffer<N>>,
    wait: WaitStrategy,
    pushed: u64,
}

impl<const N: usize> Producer<N> {
    fn new(ring: Arc<RingBuffer<N>>) -> Self {
        Self {
            ring,
            wait: WaitStrategy::default(),
            pushed: 0,
        }
    }

    /// Set the idle policy used by the blocking calls.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Current idle policy.
    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait
    }

    /// Insert one item if a slot is free. Never blocks, never allocates.
    #[inline]
    pub fn try_push(&mut self, item: Item) -> bool {
        let head = self.ring.load_head();
        let next = RingBuffer::<N>::advance(head);
        if next == self.ring.load_tail() {
            return false;
        }

        // SAFETY: head < N, and the consumer never touches slots[head] until
        // head moves past it. The index store comes after the slot store.
        unsafe {
            ptr::write_volatile(self.ring.slot_ptr(head), item);
            ptr::write_volatile(self.ring.head_ptr(), next);
        }
        self.pushed += 1;
        true
    }

    /// Poll `try_push` until it succeeds.
    #[inline]
    pub fn push_blocking(&mut self, item: Item) {
        while !self.try_push(item) {
            self.wait.idle();
        }
    }

    /// Like [`push_blocking`](Self::push_blocking), but gives up with `false`
    /// once `stop` is raised.
    #[inline]
    pub fn push_until(&mut self, item: Item, stop: &AtomicBool) -> bool {
        loop {
            if self.try_push(item) {
                return true;
            }
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            self.wait.idle();
        }
    }

    /// Poll until the consumer has advanced `tail` up to `head`.
    ///
    /// The consumer stores `tail` only after folding the item into the
    /// running total and clearing its slot, so returning here means every
    /// pushed item has been fully consumed, not merely handed off.
    pub fn wait_drained(&self) {
        while !self.ring.is_empty() {
            self.wait.idle();
        }
    }

    /// [`wait_drained`](Self::wait_drained) that gives up with `false` once
    /// `stop` is raised.
    pub fn wait_drained_until(&self, stop: &AtomicBool) -> bool {
        while !self.ring.is_empty() {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            self.wait.idle();
        }
        true
    }

    /// Items pushed through this handle.
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Read-only view of the ring.
    pub fn ring(&self) -> &RingBuffer<N> {
        &self.ring
    }
}

impl<const N: usize> std::fmt::Debug for Producer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("ring", &self.ring)
            .field("wait", &self.wait)
            .field("pushed", &self.pushed)
            .finish()
    }
}

/// Consumer side of a ring: the only writer of `tail`, `running_total`, and
/// of the slot `tail` points at once it is full.
pub struct Consumer<const N: usize> {
    ring: Arc<RingBuffer<N>>,
    wait: WaitStrategy,
    popped: u64,
}

impl<const N: usize> Consumer<N> {
    fn new(ring: Arc<RingBuffer<N>>) -> Self {
        Self {
            ring,
            wait: WaitStrategy::default(),
            popped: 0,
        }
    }

    /// Set the idle policy used by the blocking calls.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Current idle policy.
    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait
    }

    /// Take the oldest item, or `None` if the buffer is empty.
    ///
    /// The item is added to the running total and its slot zeroed before
    /// `tail` moves; `tail` is always the last store.
    #[inline]
    pub fn try_pop(&mut self) -> Option<Item> {
        let tail = self.ring.load_tail();
        if tail == self.ring.load_head() {
            return None;
        }

        // SAFETY: tail < N and the producer has finished slots[tail] (head is
        // past it). Only this handle writes tail and running_total.
        let item = unsafe {
            let slot = self.ring.slot_ptr(tail);
            let item = ptr::read_volatile(slot);
            let total = ptr::read_volatile(self.ring.total_ptr());
            ptr::write_volatile(self.ring.total_ptr(), total.wrapping_add(item as i64));
            ptr::write_volatile(slot, 0);
            ptr::write_volatile(self.ring.tail_ptr(), RingBuffer::<N>::advance(tail));
            item
        };
        self.popped += 1;
        Some(item)
    }

    /// Poll `try_pop` until an item arrives.
    #[inline]
    pub fn pop_blocking(&mut self) -> Item {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.wait.idle();
        }
    }

    /// Like [`pop_blocking`](Self::pop_blocking), but gives up with `None`
    /// once `stop` is raised. `stop` is process-local, not shared memory.
    #[inline]
    pub fn pop_until(&mut self, stop: &AtomicBool) -> Option<Item> {
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            self.wait.idle();
        }
    }

    /// Poll until an item is resident without taking it. Gives up with
    /// `false` once `stop` is raised while the buffer is still empty.
    pub fn wait_ready_until(&self, stop: &AtomicBool) -> bool {
        while self.ring.is_empty() {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            self.wait.idle();
        }
        true
    }

    /// Sum of all drained items.
    pub fn running_total(&self) -> i64 {
        self.ring.running_total()
    }

    /// Items popped through this handle.
    pub fn popped(&self) -> u64 {
        self.popped
    }

    /// Read-only view of the ring.
    pub fn ring(&self) -> &RingBuffer<N> {
        &self.ring
    }
}

impl<const N: usize> std::fmt::Debug for Consumer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("ring", &self.ring)
            .field("wait", &self.wait)
            .field("popped", &self.popped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_ready_does_not_take_the_item() {
        let (mut tx, mut rx) = RingBuffer::<4>::in_memory().unwrap().split();
        let stop = AtomicBool::new(true);
        assert!(!rx.wait_ready_until(&stop));

        tx.push_blocking(3);
        assert!(rx.wait_ready_until(&stop));
        assert_eq!(rx.ring().len(), 1);
        assert_eq!(rx.try_pop(), Some(3));
    }

    #[test]
    fn test_rejects_degenerate_capacity() {
        assert!(matches!(
            RingBuffer::<0>::in_memory(),
            Err(SharedMemoryError::InvalidCapacity { capacity: 0 })
        ));
        assert!(matches!(
            RingBuffer::<1>::in_memory(),
            Err(SharedMemoryError::InvalidCapacity { capacity: 1 })
        ));
    }

    #[test]
    fn test_push_then_pop_roundtrip() {
        let (mut tx, mut rx) = RingBuffer::<16>::in_memory().unwrap().split();
        assert!(tx.try_push(42));
        assert_eq!(rx.try_pop(), Some(42));
        assert_eq!(tx.ring().head(), tx.ring().tail());
        assert!(rx.ring().is_empty());
        assert_eq!(rx.running_total(), 42);
    }

    #[test]
    fn test_pop_on_empty_is_none() {
        let (mut tx, mut rx) = RingBuffer::<4>::in_memory().unwrap().split();
        assert_eq!(rx.try_pop(), None);
        assert!(tx.try_push(7));
        assert_eq!(rx.try_pop(), Some(7));
        assert_eq!(rx.try_pop(), None);
        assert_eq!(rx.try_pop(), None);
        assert_eq!(rx.popped(), 1);
    }

    #[test]
    fn test_capacity_two_holds_exactly_one() {
        let (mut tx, mut rx) = RingBuffer::<2>::in_memory().unwrap().split();
        for round in 0..5 {
            assert!(tx.try_push(round), "empty ring must accept a push");
            assert!(!tx.try_push(round), "one resident item fills a 2-slot ring");
            assert!(!tx.try_push(round));
            assert_eq!(rx.try_pop(), Some(round));
        }
    }

    #[test]
    fn test_capacity_sixteen_interleaved() {
        let (mut tx, mut rx) = RingBuffer::<16>::in_memory().unwrap().split();
        let mut pushed = 0;
        let mut drained = 0;

        while pushed < 20 {
            let resident = tx.ring().len();
            if tx.try_push(1) {
                assert!(resident < 15, "push succeeded with 15 items resident");
                pushed += 1;
            } else {
                assert_eq!(resident, 15);
                assert!(tx.ring().is_full());
                assert_eq!(rx.try_pop(), Some(1));
                drained += 1;
                assert!(tx.try_push(1), "push must succeed right after a pop");
                pushed += 1;
            }
        }
        while rx.try_pop().is_some() {
            drained += 1;
        }

        assert_eq!(drained, 20);
        assert_eq!(rx.popped(), 20);
        assert_eq!(rx.running_total(), 20);
        assert!(rx.ring().is_empty());
    }

    #[test]
    fn test_full_at_usable_capacity() {
        let (mut tx, mut rx) = RingBuffer::<8>::in_memory().unwrap().split();
        for i in 0..7 {
            assert!(tx.try_push(i));
        }
        assert_eq!(tx.ring().len(), 7);
        assert_eq!(tx.ring().usable_capacity(), 7);
        assert!(!tx.try_push(99));
        assert_eq!(rx.try_pop(), Some(0));
        assert!(tx.try_push(99));
        assert!(!tx.try_push(100));
    }

    #[test]
    fn test_fifo_across_wraparound() {
        let (mut tx, mut rx) = RingBuffer::<5>::in_memory().unwrap().split();
        let mut expected = 0;
        for value in 0..100 {
            if !tx.try_push(value) {
                while let Some(item) = rx.try_pop() {
                    assert_eq!(item, expected);
                    expected += 1;
                }
                assert!(tx.try_push(value));
            }
        }
        while let Some(item) = rx.try_pop() {
            assert_eq!(item, expected);
            expected += 1;
        }
        assert_eq!(expected, 100);
        assert_eq!(rx.running_total(), (0..100).sum::<i64>());
    }

    #[test]
    fn test_pop_clears_slot() {
        let ring = RingBuffer::<4>::in_memory().unwrap();
        let (mut tx, mut rx) = ring.split();
        tx.try_push(9);
        let slot = rx.ring().slot_ptr(0);
        // SAFETY: single thread, slot 0 is inside the layout
        assert_eq!(unsafe { ptr::read_volatile(slot) }, 9);
        rx.try_pop();
        assert_eq!(unsafe { ptr::read_volatile(slot) }, 0);
    }

    #[test]
    fn test_pop_until_honours_stop() {
        let (_tx, mut rx) = RingBuffer::<4>::in_memory().unwrap().split();
        let stop = AtomicBool::new(true);
        assert_eq!(rx.pop_until(&stop), None);
    }

    #[test]
    fn test_push_until_honours_stop_when_full() {
        let (mut tx, _rx) = RingBuffer::<2>::in_memory().unwrap().split();
        let stop = AtomicBool::new(true);
        assert!(tx.push_until(1, &stop), "free slot is taken even when stopping");
        assert!(!tx.push_until(2, &stop));
        assert_eq!(tx.pushed(), 1);
    }

    #[test]
    fn test_threads_transfer_every_item() {
        const COUNT: i32 = 100_000;
        let (mut tx, mut rx) = RingBuffer::<64>::in_memory().unwrap().split();

        let consumer = std::thread::spawn(move || {
            for expected in 0..COUNT {
                assert_eq!(rx.pop_blocking(), expected);
            }
            rx
        });
        for value in 0..COUNT {
            tx.push_blocking(value);
        }
        tx.wait_drained();

        let rx = consumer.join().unwrap();
        assert_eq!(rx.popped(), COUNT as u64);
        assert_eq!(tx.pushed(), COUNT as u64);
        assert_eq!(tx.ring().running_total(), (0..COUNT as i64).sum::<i64>());
    }

    #[test]
    fn test_region_size_matches_layout() {
        assert_eq!(
            RingBuffer::<16>::region_size(),
            std::mem::size_of::<RingLayout<16>>()
        );
        assert!(RingBuffer::<16>::region_size() >= 16 * ITEM_SIZE + 3 * 8);
    }
}
