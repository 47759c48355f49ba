//! tally-reconcile
//!
//! Merges this process's locally-accumulated increments with the total
//! published by its peers.
//!
//! Architectural decisions:
//! - Foreground increments touch only the atomic [`LocalCounter`]
//! - One [`ReconcileEngine`] per process owns the [`Watermark`] exclusively
//! - Each tick: read remote, fold the peer delta into the counter in one
//!   atomic fetch-and-add, publish only if the record is unchanged
//! - Conflict and unavailability abandon the attempt; the next tick retries
//!
//! The merge step ([`plan_merge`]) touches nothing but the counter. The
//! engine adds the store IO around it.

mod counter;
mod engine;
mod types;
mod watermark;

pub use counter::{CounterBoundary, IncrementRejected, LocalCounter, DEFAULT_MAX_INCREMENT};
pub use engine::{plan_merge, ReconcileEngine};
pub use types::*;
pub use watermark::{Watermark, WatermarkAdvance};
