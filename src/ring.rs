//! Single-producer, single-consumer byte rings
//!
//! A [`RingBuffer`] connects exactly two execution contexts. One context
//! owns the [`Producer`], the other owns the [`Consumer`]. Roles are handed
//! out once by [`split()`](RingBuffer::split) and never change.
//!
//! Emptiness is tracked with a sentinel in the consumer index, instead of
//! comparing head and tail. That makes every slot usable: a ring of capacity
//! `C` holds `C` bytes.
//!
//! # Concurrency
//!
//! - `next_free` is only written by the producer.
//! - The byte at `next_free` is only written by the producer, and only while
//!   that slot is outside the unconsumed region.
//! - `next_ready` is written by the consumer when it advances, and by the
//!   producer when it takes the ring out of the empty state.
//!
//! The two writers of `next_ready` are serialized with a short critical section
//! around the sentinel transitions. Everything else is a single atomic load
//! or store. A byte is stored before the index that publishes it.

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, AtomicU8, Ordering},
};

/// `next_ready` value of an empty ring
const EMPTY: u8 = 0xFF;

/// A fixed-capacity byte FIFO
///
/// `C` must be a power of two, between 2 and 128. Allocate a `static` ring
/// and split it into its producer and consumer.
///
/// ```
/// use softuart_usbd::ring::RingBuffer;
///
/// static RING: RingBuffer<16> = RingBuffer::new();
///
/// let (mut producer, mut consumer) = RING.split().unwrap();
/// assert!(RING.split().is_none());
///
/// assert!(producer.try_push(0x55));
/// assert_eq!(consumer.try_pop(), Some(0x55));
/// assert_eq!(consumer.try_pop(), None);
/// ```
pub struct RingBuffer<const C: usize> {
    slots: UnsafeCell<[u8; C]>,
    /// Where the producer writes next
    next_free: AtomicU8,
    /// Oldest unconsumed byte, or `EMPTY`
    next_ready: AtomicU8,
    split: AtomicBool,
}

// Safety: slot access follows the single-writer rules in the module docs.
unsafe impl<const C: usize> Sync for RingBuffer<C> {}

impl<const C: usize> RingBuffer<C> {
    /// Wraps an index to the capacity
    const MASK: u8 = {
        assert!(
            C.is_power_of_two() && C >= 2 && C <= 128,
            "ring capacity must be a power of two in 2..=128"
        );
        (C - 1) as u8
    };

    /// Create an empty ring
    pub const fn new() -> Self {
        let _mask = Self::MASK;
        Self {
            slots: UnsafeCell::new([0; C]),
            next_free: AtomicU8::new(0),
            next_ready: AtomicU8::new(EMPTY),
            split: AtomicBool::new(false),
        }
    }

    /// Acquire the producer and consumer.
    ///
    /// Returns `None` if the ring was already split.
    pub fn split(&self) -> Option<(Producer<'_, C>, Consumer<'_, C>)> {
        let taken = critical_section::with(|_| {
            let taken = self.split.load(Ordering::Relaxed);
            self.split.store(true, Ordering::Relaxed);
            taken
        });
        (!taken).then_some((Producer { ring: self }, Consumer { ring: self }))
    }

    /// Returns the number of bytes the ring can hold.
    pub const fn capacity(&self) -> usize {
        C
    }

    /// Returns the number of unused slots.
    ///
    /// An empty ring has `C` free slots. A full ring has none.
    pub fn free_count(&self) -> usize {
        let ready = self.next_ready.load(Ordering::Acquire);
        if ready == EMPTY {
            return C;
        }
        let free = self.next_free.load(Ordering::Acquire);
        usize::from(ready.wrapping_sub(free) & Self::MASK)
    }

    /// Returns the number of unconsumed bytes.
    pub fn len(&self) -> usize {
        C - self.free_count()
    }

    /// Indicates if there's nothing to consume.
    pub fn is_empty(&self) -> bool {
        self.next_ready.load(Ordering::Acquire) == EMPTY
    }

    /// Producer side of `try_push`. Only called through a `Producer`.
    fn push(&self, byte: u8) -> bool {
        let free = self.next_free.load(Ordering::Relaxed);
        if free == self.next_ready.load(Ordering::Acquire) {
            return false;
        }

        // Safety: `free` is in bounds, and the slot isn't part of the
        // unconsumed region. Only the producer writes it.
        unsafe {
            self.slots
                .get()
                .cast::<u8>()
                .add(usize::from(free))
                .write(byte)
        };

        let next = free.wrapping_add(1) & Self::MASK;
        critical_section::with(|_| {
            self.next_free.store(next, Ordering::Release);
            if self.next_ready.load(Ordering::Relaxed) == EMPTY {
                self.next_ready.store(free, Ordering::Release);
            }
        });
        true
    }

    /// Consumer side of `try_pop`. Only called through a `Consumer`.
    fn pop(&self) -> Option<u8> {
        let ready = self.next_ready.load(Ordering::Acquire);
        if ready == EMPTY {
            return None;
        }

        // Safety: `ready` is in bounds, and the producer never writes
        // an unconsumed slot.
        let byte = unsafe {
            self.slots
                .get()
                .cast::<u8>()
                .add(usize::from(ready))
                .read()
        };

        let next = ready.wrapping_add(1) & Self::MASK;
        critical_section::with(|_| {
            if next == self.next_free.load(Ordering::Acquire) {
                self.next_ready.store(EMPTY, Ordering::Release);
            } else {
                self.next_ready.store(next, Ordering::Release);
            }
        });
        Some(byte)
    }
}

impl<const C: usize> Default for RingBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// The writing half of a [`RingBuffer`]
pub struct Producer<'a, const C: usize> {
    ring: &'a RingBuffer<C>,
}

impl<const C: usize> Producer<'_, C> {
    /// Append `byte` to the ring.
    ///
    /// Returns `false` if the ring is full. The byte is not stored, and
    /// the ring is unchanged.
    pub fn try_push(&mut self, byte: u8) -> bool {
        self.ring.push(byte)
    }

    /// Returns the number of bytes that can be pushed right now.
    pub fn free_count(&self) -> usize {
        self.ring.free_count()
    }
}

/// The reading half of a [`RingBuffer`]
pub struct Consumer<'a, const C: usize> {
    ring: &'a RingBuffer<C>,
}

impl<const C: usize> Consumer<'_, C> {
    /// Remove the oldest byte from the ring.
    ///
    /// Returns `None` if the ring is empty.
    pub fn try_pop(&mut self) -> Option<u8> {
        self.ring.pop()
    }

    /// Indicates if there's nothing to pop.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns the number of bytes waiting to be popped.
    pub fn len(&self) -> usize {
        self.ring.len()
    }
}
