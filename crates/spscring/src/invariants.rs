//! Debug assertion macros for the ring's sequence-number protocol.
//!
//! Active only in debug builds (`debug_assertions`), so release builds pay
//! nothing. Both indices are unbounded u64 sequence numbers; the checks
//! below catch protocol bugs, not ordinary wrap arithmetic.

/// Assert that the occupied slot count never exceeds capacity.
///
/// Holds whenever `tail` advances: `0 ≤ (tail - head) ≤ capacity`.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "ring overfilled: {} items in a ring of capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that the consumer never advances past the producer.
///
/// Holds whenever `head` advances: `head ≤ tail`.
macro_rules! debug_assert_head_not_past_tail {
    ($new_head:expr, $tail:expr) => {
        debug_assert!(
            $new_head <= $tail,
            "consumer overran producer: head {} beyond tail {}",
            $new_head,
            $tail
        )
    };
}

/// Assert that a sequence number only moves forward.
///
/// At one push per nanosecond a u64 sequence takes centuries to wrap, so a
/// decrease always means a protocol bug.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} sequence went backwards: {} -> {}",
            $name,
            $old,
            $new
        )
    };
}

/// Assert that a slot being read lies in the initialized range.
///
/// `buffer[i]` is initialized iff `head ≤ sequence(i) < tail`.
macro_rules! debug_assert_initialized_read {
    ($pos:expr, $head:expr, $tail:expr) => {
        debug_assert!(
            $pos >= $head && $pos < $tail,
            "read of uninitialized slot: seq {} outside [{}, {})",
            $pos,
            $head,
            $tail
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_initialized_read;
pub(crate) use debug_assert_monotonic;
