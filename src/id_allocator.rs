use crate::error::{Error, Result};
use std::ops::Range;
use std::sync::atomic::{AtomicI64, Ordering};

/// First id handed out; 0 is reserved for "no parent".
pub const FIRST_ID: i64 = 1;

/// Issues contiguous blocks of strictly increasing particle ids.
///
/// The counter is atomic, so one allocator may be shared between engines
/// running on different threads (wrap it in an `Arc`).
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            next: AtomicI64::new(FIRST_ID),
        }
    }

    /// Reserve `count` ids and return them as a half-open range.
    pub fn allocate(&self, count: usize) -> Result<Range<i64>> {
        let count = i64::try_from(count).map_err(|_| Error::IdOverflow)?;
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let end = current.checked_add(count).ok_or(Error::IdOverflow)?;
            match self.next.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(current..end),
                Err(actual) => current = actual,
            }
        }
    }

    /// Number of ids handed out since construction or the last reset.
    pub fn issued_so_far(&self) -> i64 {
        self.next.load(Ordering::Acquire) - FIRST_ID
    }

    /// Start issuing from [`FIRST_ID`] again.
    pub fn reset(&self) {
        self.next.store(FIRST_ID, Ordering::Release);
    }

    #[cfg(test)]
    fn starting_at(next: i64) -> Self {
        IdAllocator {
            next: AtomicI64::new(next),
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_are_contiguous_and_increasing() {
        let ids = IdAllocator::new();
        assert_eq!(ids.allocate(3).unwrap(), 1..4);
        assert_eq!(ids.allocate(2).unwrap(), 4..6);
        assert_eq!(ids.issued_so_far(), 5);
    }

    #[test]
    fn test_zero_sized_block() {
        let ids = IdAllocator::new();
        let r = ids.allocate(0).unwrap();
        assert!(r.is_empty());
        assert_eq!(ids.issued_so_far(), 0);
    }

    #[test]
    fn test_reset_restarts_at_one() {
        let ids = IdAllocator::new();
        ids.allocate(10).unwrap();
        ids.reset();
        assert_eq!(ids.allocate(1).unwrap(), 1..2);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let ids = IdAllocator::starting_at(i64::MAX - 1);
        assert!(matches!(ids.allocate(5), Err(Error::IdOverflow)));
        // Counter untouched by the failed request
        assert_eq!(ids.allocate(1).unwrap(), (i64::MAX - 1)..i64::MAX);
    }
}
