use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Largest single increment accepted when none is configured.
pub const DEFAULT_MAX_INCREMENT: u64 = 500;

/// Process-local running total.
///
/// Only ever grows, and never wraps. Every mutation is a single atomic
/// compare-and-swap loop that refuses an addition past `u64::MAX`, so
/// foreground increments and the engine's absorption of peer deltas never
/// race through a read-modify-write gap.
#[derive(Debug, Default)]
pub struct LocalCounter(AtomicU64);

impl LocalCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current total.
    pub fn load(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Add `n` and return the new total, or `None` (counter untouched) if
    /// the total would overflow.
    pub fn increment(&self, n: u64) -> Option<u64> {
        self.fetch_and_add(n).map(|prior| prior + n)
    }

    /// Add `n` and return the total *before* the addition, or `None`
    /// (counter untouched) if the total would overflow.
    pub fn fetch_and_add(&self, n: u64) -> Option<u64> {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(n))
            .ok()
    }
}

/// An increment request that was refused without touching the counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncrementRejected {
    /// Outside `0..=max`.
    TooLarge { requested: u64, max: u64 },
    /// Would push the total past `u64::MAX`.
    Overflow { requested: u64, total: u64 },
}

impl fmt::Display for IncrementRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncrementRejected::TooLarge { requested, max } => write!(
                f,
                "increment of {requested} rejected: must be at most {max}"
            ),
            IncrementRejected::Overflow { requested, total } => write!(
                f,
                "increment of {requested} rejected: total {total} would overflow"
            ),
        }
    }
}

impl std::error::Error for IncrementRejected {}

/// What the request-serving front end is allowed to do with the counter.
#[derive(Clone, Debug)]
pub struct CounterBoundary {
    counter: Arc<LocalCounter>,
    max_increment: u64,
}

impl CounterBoundary {
    pub fn new(counter: Arc<LocalCounter>, max_increment: u64) -> Self {
        Self {
            counter,
            max_increment,
        }
    }

    pub fn max_increment(&self) -> u64 {
        self.max_increment
    }

    pub fn get_total(&self) -> u64 {
        self.counter.load()
    }

    /// Validate `n` against the configured bound, then add it.
    ///
    /// A rejected request leaves the counter untouched.
    pub fn increment_by(&self, n: u64) -> Result<u64, IncrementRejected> {
        if n > self.max_increment {
            return Err(IncrementRejected::TooLarge {
                requested: n,
                max: self.max_increment,
            });
        }
        self.counter
            .increment(n)
            .ok_or_else(|| IncrementRejected::Overflow {
                requested: n,
                total: self.counter.load(),
            })
    }
}
