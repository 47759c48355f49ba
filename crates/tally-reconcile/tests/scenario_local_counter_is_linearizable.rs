//! Scenario: LocalCounter under concurrent callers
//!
//! # Invariants under test
//!
//! 1. Concurrent increments never lose an update.
//! 2. Every `increment` returns a distinct new total (no two callers observe
//!    the same post-increment value for non-zero steps).
//! 3. Concurrent `fetch_and_add` folds interleave with increments without
//!    losing either side.

use std::collections::BTreeSet;
use std::sync::Arc;

use tally_reconcile::LocalCounter;

#[test]
fn concurrent_increments_are_not_lost() {
    let counter = Arc::new(LocalCounter::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let c = Arc::clone(&counter);
            std::thread::spawn(move || {
                let mut seen = Vec::with_capacity(1_000);
                for _ in 0..1_000 {
                    seen.push(c.increment(1).unwrap());
                }
                seen
            })
        })
        .collect();

    let mut all = BTreeSet::new();
    for h in handles {
        for v in h.join().unwrap() {
            assert!(all.insert(v), "total {v} returned twice");
        }
    }

    assert_eq!(counter.load(), 8_000);
    assert_eq!(all.len(), 8_000);
    assert_eq!(all.first(), Some(&1));
    assert_eq!(all.last(), Some(&8_000));
}

#[test]
fn folds_and_increments_interleave_without_loss() {
    let counter = Arc::new(LocalCounter::new());

    let clicker = {
        let c = Arc::clone(&counter);
        std::thread::spawn(move || {
            for _ in 0..10_000 {
                c.increment(2);
            }
        })
    };
    let folder = {
        let c = Arc::clone(&counter);
        std::thread::spawn(move || {
            let mut last = 0;
            for _ in 0..1_000 {
                let prior = c.fetch_and_add(5).unwrap();
                assert!(prior >= last, "counter went backwards");
                last = prior + 5;
            }
        })
    };

    clicker.join().unwrap();
    folder.join().unwrap();
    assert_eq!(counter.load(), 20_000 + 5_000);
}
