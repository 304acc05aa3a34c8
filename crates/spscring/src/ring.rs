use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_initialized_read,
    debug_assert_monotonic,
};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Classic SPSC producer-consumer protocol over unbounded u64 sequence numbers:
//
// - `head` and `tail` are free-running sequences, never wrapped. The buffer
//   index is `sequence & mask` (capacity is a power of two). With 2^64
//   values, ABA is a non-issue.
//
// **Producer (push path):**
// 1. Load `tail` with Relaxed (only the producer writes tail)
// 2. Check `cached_head` (UnsafeCell, producer is its only writer)
// 3. If the cache shows no space: load `head` with Acquire and refresh it
// 4. Write the item into the slot (plain write, protected by the protocol)
// 5. Store `tail` with Release (publishes the slot to the consumer)
//
// **Consumer (drain path):**
// 1. Load `head` with Relaxed (only the consumer writes head)
// 2. Load `tail` with Acquire (synchronizes with the producer's Release)
// 3. Move items out of `[head, tail)` (plain reads, protected by protocol)
// 4. Store `head` with Release once for the whole batch
//
// ## Single-Writer Invariants
//
// `cached_head` is read and written only by the producer; `cached_tail`
// only by the consumer. A slot is written only by the producer between
// reservation and Release of `tail`, and read only by the consumer between
// the Acquire of `tail` and the Release of `head`. The handle split makes
// these invariants structural: `Producer` and `Consumer` do not implement
// `Clone`, so each side has exactly one owner.
//
// =============================================================================

/// Error returned by [`Producer::push`] when the ring is full.
///
/// Carries the rejected item back to the caller so nothing is lost on the
/// overflow path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ring buffer is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

struct Shared<T> {
    // === PRODUCER HOT ===
    /// Tail sequence (written by producer, read by consumer).
    tail: CachePadded<AtomicU64>,
    /// Producer's cached view of head (avoids cross-core reads).
    cached_head: CachePadded<UnsafeCell<u64>>,

    // === CONSUMER HOT ===
    /// Head sequence (written by consumer, read by producer).
    head: CachePadded<AtomicU64>,
    /// Consumer's cached view of tail (avoids cross-core reads).
    cached_tail: CachePadded<UnsafeCell<u64>>,

    // === COLD ===
    capacity: usize,
    mask: usize,

    /// Fixed slot storage. `Box<[T]>` rather than `Vec<T>`: the buffer is
    /// sized once at construction and never grows.
    buffer: UnsafeCell<Box<[MaybeUninit<T>]>>,
}

// Safety: the sequence protocol above hands each slot to exactly one side
// at a time; the atomics publish the ownership transfer.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ring capacity must be at least 1");
        assert!(
            capacity <= 1 << 24,
            "ring capacity must not exceed 16M slots"
        );
        let capacity = capacity.next_power_of_two();

        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, MaybeUninit::uninit);

        Self {
            tail: CachePadded::new(AtomicU64::new(0)),
            cached_head: CachePadded::new(UnsafeCell::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            cached_tail: CachePadded::new(UnsafeCell::new(0)),
            capacity,
            mask: capacity - 1,
            buffer: UnsafeCell::new(buffer.into_boxed_slice()),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Drop every item still sitting between head and tail.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;

        if count > 0 {
            let buffer = self.buffer.get_mut();
            for i in 0..count {
                let idx = ((head as usize).wrapping_add(i)) & self.mask;
                unsafe {
                    ptr::drop_in_place(buffer[idx].as_mut_ptr());
                }
            }
        }
    }
}

/// Creates a bounded SPSC ring and splits it into its two handles.
///
/// `capacity` is rounded up to the next power of two. The producer handle
/// belongs to exactly one thread, the consumer handle to exactly one
/// (possibly different) thread.
///
/// # Panics
///
/// Panics if `capacity` is 0 or exceeds 16M slots.
pub fn ring<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let shared = Arc::new(Shared::new(capacity));
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// The write half of the ring. Owned by the producer thread.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

// Note: Producer intentionally does NOT implement Clone. A second handle
// would mean a second writer to `tail` and `cached_head`, breaking the
// single-producer invariant that makes the ring lock-free.

unsafe impl<T: Send> Send for Producer<T> {}

impl<T> Producer<T> {
    /// Attempts to enqueue one item without blocking.
    ///
    /// Returns `Err(Full(item))` when the ring is at capacity, handing the
    /// item back untouched. There are no other failure modes.
    pub fn push(&self, item: T) -> Result<(), Full<T>> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);

        // Fast path: the cached head may already show free space.
        // SAFETY: cached_head is written only by the producer (this path),
        // and this Producer is the single handle on the producer side.
        let cached_head = unsafe { *shared.cached_head.get() };
        let mut space = shared
            .capacity
            .saturating_sub(tail.wrapping_sub(cached_head) as usize);

        if space == 0 {
            // Slow path: refresh the cache from the real head.
            let head = shared.head.load(Ordering::Acquire);
            // SAFETY: same single-writer argument as above; the Acquire
            // load synchronizes with the consumer's Release store.
            unsafe {
                *shared.cached_head.get() = head;
            }
            space = shared
                .capacity
                .saturating_sub(tail.wrapping_sub(head) as usize);
            if space == 0 {
                return Err(Full(item));
            }
        }

        let idx = (tail as usize) & shared.mask;
        // SAFETY: space > 0, so the slot at `tail` is beyond the consumer's
        // reach until the Release store below publishes it.
        unsafe {
            let buffer = &mut *shared.buffer.get();
            buffer[idx].write(item);
        }

        let new_tail = tail.wrapping_add(1);
        debug_assert_bounded_count!(
            new_tail.wrapping_sub(shared.head.load(Ordering::Relaxed)) as usize,
            shared.capacity
        );
        debug_assert_monotonic!("tail", tail, new_tail);

        shared.tail.store(new_tail, Ordering::Release);
        Ok(())
    }

    /// Returns the ring capacity (after power-of-two rounding).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Best-effort count of items currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Best-effort emptiness check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.len() == 0
    }

    /// Best-effort fullness check.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.shared.len() >= self.shared.capacity
    }
}

/// The read half of the ring. Owned by the consumer thread.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

// Consumer is likewise a unique handle; see the note on Producer.

unsafe impl<T: Send> Send for Consumer<T> {}

impl<T> Consumer<T> {
    /// Pops up to `limit` items in FIFO order, transferring ownership of
    /// each to `f`. Returns the number of items popped.
    ///
    /// The head index is published once for the whole batch, amortizing the
    /// atomic store over every item drained.
    pub fn drain<F>(&self, limit: usize, mut f: F) -> usize
    where
        F: FnMut(T),
    {
        if limit == 0 {
            return 0;
        }

        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);

        // Fast path: the cached tail may already show available items.
        // SAFETY: cached_tail is written only by the consumer (this path).
        let mut tail = unsafe { *shared.cached_tail.get() };
        let mut avail = tail.wrapping_sub(head) as usize;

        if avail == 0 {
            tail = shared.tail.load(Ordering::Acquire);
            // SAFETY: single consumer-side writer; the Acquire load
            // synchronizes with the producer's Release store.
            unsafe {
                *shared.cached_tail.get() = tail;
            }
            avail = tail.wrapping_sub(head) as usize;
            if avail == 0 {
                return 0;
            }
        }

        let to_pop = avail.min(limit);
        let mut pos = head;
        let mut count = 0;

        // Move items out; no atomics inside the loop.
        while count < to_pop {
            debug_assert_initialized_read!(pos, head, tail);

            let idx = (pos as usize) & shared.mask;
            // SAFETY: `pos` lies in `[head, tail)`, fully written by the
            // producer and published by its Release store; ownership moves
            // out here and the slot is dead until head advances past it.
            let item = unsafe {
                let buffer = &*shared.buffer.get();
                buffer[idx].assume_init_read()
            };
            f(item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        let new_head = head.wrapping_add(count as u64);
        debug_assert_head_not_past_tail!(new_head, tail);
        debug_assert_monotonic!("head", head, new_head);

        shared.head.store(new_head, Ordering::Release);
        count
    }

    /// Pops a single item, if one is available.
    pub fn pop(&self) -> Option<T> {
        let mut out = None;
        self.drain(1, |item| out = Some(item));
        out
    }

    /// Returns the ring capacity (after power-of-two rounding).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Best-effort count of items currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Best-effort emptiness check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.len() == 0
    }

    /// Best-effort fullness check.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.shared.len() >= self.shared.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_then_drain_fifo() {
        let (tx, rx) = ring::<u64>(16);

        for i in 0..10 {
            tx.push(i).unwrap();
        }
        assert_eq!(tx.len(), 10);

        let mut seen = Vec::new();
        let drained = rx.drain(usize::MAX, |item| seen.push(item));

        assert_eq!(drained, 10);
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_returns_item() {
        let (tx, rx) = ring::<u64>(4);

        for i in 0..4 {
            tx.push(i).unwrap();
        }
        assert!(tx.is_full());

        let err = tx.push(99).unwrap_err();
        assert_eq!(err, Full(99));

        // Draining one frees a slot.
        assert_eq!(rx.pop(), Some(0));
        tx.push(99).unwrap();
    }

    #[test]
    fn test_drain_respects_limit() {
        let (tx, rx) = ring::<u64>(16);

        for i in 0..10 {
            tx.push(i).unwrap();
        }

        let mut seen = Vec::new();
        assert_eq!(rx.drain(4, |item| seen.push(item)), 4);
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(rx.len(), 6);

        assert_eq!(rx.drain(100, |item| seen.push(item)), 6);
        assert_eq!(seen.last(), Some(&9));
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let (tx, _rx) = ring::<u64>(500);
        assert_eq!(tx.capacity(), 512);

        let (tx, _rx) = ring::<u64>(1);
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    #[should_panic(expected = "ring capacity must be at least 1")]
    fn test_zero_capacity_panics() {
        let _ = ring::<u64>(0);
    }

    #[test]
    fn test_wraparound_reuses_slots() {
        let (tx, rx) = ring::<u64>(4);

        // Cycle through the buffer several times.
        for round in 0..8u64 {
            for i in 0..4 {
                tx.push(round * 10 + i).unwrap();
            }
            let mut seen = Vec::new();
            rx.drain(usize::MAX, |item| seen.push(item));
            assert_eq!(seen, vec![round * 10, round * 10 + 1, round * 10 + 2, round * 10 + 3]);
        }
    }

    #[test]
    fn test_drop_of_in_flight_items() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        #[derive(Debug)]
        struct DropTracker(Arc<AtomicUsize>);
        impl Drop for DropTracker {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = ring::<DropTracker>(8);

        for _ in 0..5 {
            tx.push(DropTracker(Arc::clone(&drops))).unwrap();
        }
        rx.drain(2, |item| drop(item));
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        // The three undrained items are dropped with the ring.
        drop(tx);
        drop(rx);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_two_threads() {
        let (tx, rx) = ring::<u64>(64);
        const N: u64 = 10_000;

        let producer = std::thread::spawn(move || {
            let mut sent = 0;
            while sent < N {
                if tx.push(sent).is_ok() {
                    sent += 1;
                }
            }
        });

        let mut expected = 0;
        while expected < N {
            rx.drain(32, |item| {
                assert_eq!(item, expected);
                expected += 1;
            });
        }

        producer.join().unwrap();
        assert!(rx.is_empty());
    }
}
