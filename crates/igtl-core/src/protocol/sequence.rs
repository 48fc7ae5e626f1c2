//! Frame sequence numbering.
//!
//! Every frame pushed by a transport carries a sequence number so that a
//! receiver can spot gaps left by clients that were dropped for writing too
//! slowly.  Numbering restarts whenever a transport is bound again.

use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free, monotonically increasing counter.
///
/// Starts at 0 and wraps from `u64::MAX` back to 0 without panicking.
///
/// # Examples
///
/// ```rust
/// use igtl_core::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// counter.reset();
/// assert_eq!(counter.next(), 0);
/// ```
#[derive(Debug, Default)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// Creates a counter starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next sequence number and advances the counter.
    pub fn next(&self) -> u64 {
        // Relaxed: the value only orders frames, it does not publish memory.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the number the next call to [`next`](Self::next) will yield.
    pub fn peek(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }

    /// Restarts numbering at 0.
    pub fn reset(&self) {
        self.inner.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_starts_at_zero_and_increments() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.peek(), 2);
    }

    #[test]
    fn test_counter_wraps_at_u64_max() {
        // Arrange
        let counter = SequenceCounter {
            inner: AtomicU64::new(u64::MAX),
        };

        // Act / Assert
        assert_eq!(counter.next(), u64::MAX);
        assert_eq!(counter.next(), 0, "counter must wrap to 0 after u64::MAX");
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let counter = SequenceCounter::new();
        counter.next();
        counter.next();

        counter.reset();

        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_values_are_unique_across_threads() {
        // Arrange
        let counter = Arc::new(SequenceCounter::new());

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..500).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 2000, "every sequence number must be unique");
    }
}
