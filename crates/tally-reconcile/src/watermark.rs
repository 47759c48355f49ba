//! Publish watermark
//!
//! # Purpose
//!
//! Records the last global total *this* process successfully published.
//! The difference between the counter and the watermark is the local
//! contribution not yet reflected in the shared record; the difference
//! between the record and the watermark is what peers contributed since.
//!
//! # Invariants
//!
//! - **Non-decreasing**: an advance to a lower total is refused.
//! - **Advances only on publish**: the engine calls [`Watermark::advance`]
//!   after a committed publish and never otherwise.
//! - **Single owner**: lives inside the engine; no locks, no sharing.

/// Result of offering a published total to the watermark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatermarkAdvance {
    /// The watermark moved up to the offered total.
    Advanced { from: u64, to: u64 },

    /// The offered total equals the watermark (a publish with no new
    /// contributions from anyone).
    Unchanged,

    /// The offered total is below the watermark. The watermark did not move.
    Regressed { watermark: u64, got: u64 },
}

impl WatermarkAdvance {
    /// `true` unless the offer was refused.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, WatermarkAdvance::Regressed { .. })
    }
}

#[derive(Debug, Default)]
pub struct Watermark {
    published: u64,
}

impl Watermark {
    /// Initial watermark: nothing published yet, value 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u64 {
        self.published
    }

    /// What [`advance`][Watermark::advance] would do, without moving.
    pub fn check(&self, total: u64) -> WatermarkAdvance {
        if total < self.published {
            WatermarkAdvance::Regressed {
                watermark: self.published,
                got: total,
            }
        } else if total == self.published {
            WatermarkAdvance::Unchanged
        } else {
            WatermarkAdvance::Advanced {
                from: self.published,
                to: total,
            }
        }
    }

    /// Move to `total` if that does not regress.
    pub fn advance(&mut self, total: u64) -> WatermarkAdvance {
        let result = self.check(total);
        if let WatermarkAdvance::Advanced { to, .. } = result {
            self.published = to;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(Watermark::new().value(), 0);
    }

    #[test]
    fn advance_moves_up_and_refuses_down() {
        let mut wm = Watermark::new();
        assert_eq!(wm.advance(10), WatermarkAdvance::Advanced { from: 0, to: 10 });
        assert_eq!(wm.advance(10), WatermarkAdvance::Unchanged);

        let r = wm.advance(4);
        assert_eq!(r, WatermarkAdvance::Regressed { watermark: 10, got: 4 });
        assert!(!r.is_accepted());
        assert_eq!(wm.value(), 10);
    }

    #[test]
    fn check_is_read_only() {
        let wm = Watermark::new();
        assert!(wm.check(3).is_accepted());
        assert_eq!(wm.value(), 0);
    }
}
