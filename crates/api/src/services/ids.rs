//! Snowflake-style id generation.
//!
//! ```text
//!  63      22 21     12 11        0
//! +----------+---------+-----------+
//! | ms since | node id | sequence  |
//! |  epoch   | 10 bits |  12 bits  |
//! +----------+---------+-----------+
//! ```
//!
//! The timestamp and sequence are packed into one `AtomicU64` and advanced
//! with compare-and-swap, so ids from one generator are strictly increasing
//! without a lock. When a millisecond's sequence is exhausted the generator
//! borrows the next millisecond instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use thiserror::Error;

/// 2024-01-01T00:00:00Z in Unix milliseconds.
pub const EPOCH_MS: i64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Largest accepted node id.
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;

/// Id generator construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("node id {0} exceeds {MAX_NODE_ID}")]
    NodeOutOfRange(u16),
}

/// Hands out unique, increasing 64-bit ids.
#[derive(Debug)]
pub struct IdGenerator {
    node: u64,
    /// `timestamp << SEQUENCE_BITS | sequence` of the last id issued.
    state: AtomicU64,
}

impl IdGenerator {
    /// Create a generator for one node.
    ///
    /// # Errors
    ///
    /// Returns `IdError::NodeOutOfRange` if `node` does not fit in 10 bits.
    pub const fn new(node: u16) -> Result<Self, IdError> {
        if node > MAX_NODE_ID {
            return Err(IdError::NodeOutOfRange(node));
        }
        Ok(Self {
            node: node as u64,
            state: AtomicU64::new(0),
        })
    }

    /// The next id, converted into a typed id.
    pub fn next_id<T: From<i64>>(&self) -> T {
        T::from(self.next_raw())
    }

    /// The next id.
    pub fn next_raw(&self) -> i64 {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            let next = advance(current, now_ms());
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return self.compose(next),
                Err(actual) => current = actual,
            }
        }
    }

    fn compose(&self, state: u64) -> i64 {
        let timestamp = state >> SEQUENCE_BITS;
        let sequence = state & SEQUENCE_MASK;
        let id = (timestamp << (NODE_BITS + SEQUENCE_BITS)) | (self.node << SEQUENCE_BITS) | sequence;
        i64::try_from(id).unwrap_or(i64::MAX)
    }
}

/// Next packed state after `current` at wall-clock `now`.
const fn advance(current: u64, now: u64) -> u64 {
    let last = current >> SEQUENCE_BITS;
    if now > last {
        now << SEQUENCE_BITS
    } else {
        // Same (or earlier) millisecond: bump the sequence, overflowing into
        // the timestamp when it runs out.
        current + 1
    }
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis() - EPOCH_MS).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use cartwheel_core::CartId;

    use super::*;

    #[test]
    fn test_node_range() {
        assert!(IdGenerator::new(MAX_NODE_ID).is_ok());
        assert_eq!(
            IdGenerator::new(MAX_NODE_ID + 1).unwrap_err(),
            IdError::NodeOutOfRange(1024)
        );
    }

    #[test]
    fn test_ids_strictly_increase() {
        let ids = IdGenerator::new(3).unwrap();
        let mut previous = ids.next_raw();
        for _ in 0..10_000 {
            let id = ids.next_raw();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn test_node_bits_embedded() {
        let ids = IdGenerator::new(42).unwrap();
        let id = ids.next_raw();
        assert_eq!((id >> SEQUENCE_BITS) & i64::from(MAX_NODE_ID), 42);
        assert!(id > 0);
    }

    #[test]
    fn test_sequence_overflow_borrows_next_millisecond() {
        let exhausted = (7 << SEQUENCE_BITS) | SEQUENCE_MASK;
        assert_eq!(advance(exhausted, 7), 8 << SEQUENCE_BITS);
        assert_eq!(advance(exhausted, 9), 9 << SEQUENCE_BITS);
        assert_eq!(advance(7 << SEQUENCE_BITS, 3), (7 << SEQUENCE_BITS) + 1);
    }

    #[test]
    fn test_typed_ids() {
        let ids = IdGenerator::new(1).unwrap();
        let a: CartId = ids.next_id();
        let b: CartId = ids.next_id();
        assert!(b > a);
    }

    #[test]
    fn test_unique_across_threads() {
        let ids = Arc::new(IdGenerator::new(1).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..2_000).map(|_| ids.next_raw()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 8_000);
    }
}
