use std::sync::Arc;

use tally_store::{CounterStore, StoreError};
use tracing::{debug, error, warn};

use crate::watermark::Watermark;
use crate::{LocalCounter, MergePlan, StoreStage, TickOutcome};

/// Fold the peer contribution into `counter` and compute the total to publish.
///
/// `absorbed` is the highest remote total whose peer contribution is already
/// in the counter. It equals the watermark after a successful publish and
/// only runs ahead of it while publishes are failing.
///
/// - A record below `absorbed` is treated as equal to it (clamp), so a reset
///   or lost record never drags acknowledged progress down.
/// - `remote_delta` is added to the counter with one `fetch_and_add`; the
///   value it returns is the snapshot our own contribution is measured from.
///   Foreground increments racing with this call land either before the
///   snapshot (published now) or after it (published next time), never both.
///
/// Returns `None`, with the counter untouched, if folding the record in
/// would push the total past `u64::MAX`.
pub fn plan_merge(absorbed: u64, observed: u64, counter: &LocalCounter) -> Option<MergePlan> {
    let clamped = observed < absorbed;
    let remote = observed.max(absorbed);
    let remote_delta = remote - absorbed;

    let snapshot = counter.fetch_and_add(remote_delta)?;
    debug_assert!(snapshot >= absorbed, "counter fell below absorbed total");
    let local_delta = snapshot.saturating_sub(absorbed);

    // remote + local_delta == snapshot + remote_delta, which the fold above
    // has already proven fits.
    Some(MergePlan {
        observed,
        remote,
        clamped,
        remote_delta,
        snapshot,
        local_delta,
        new_total: remote.saturating_add(local_delta),
    })
}

/// Periodic merge-and-publish against one shared record.
///
/// Owns the [`Watermark`]; move the engine into the single task that calls
/// [`tick`][ReconcileEngine::tick] so attempts never overlap.
pub struct ReconcileEngine {
    store: Arc<dyn CounterStore>,
    key: String,
    counter: Arc<LocalCounter>,
    watermark: Watermark,
    /// Remote total already folded into `counter`. Always >= watermark.
    absorbed: u64,
    consecutive_failures: u64,
}

impl ReconcileEngine {
    pub fn new(
        store: Arc<dyn CounterStore>,
        key: impl Into<String>,
        counter: Arc<LocalCounter>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            counter,
            watermark: Watermark::new(),
            absorbed: 0,
            consecutive_failures: 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Last total this engine published (0 before the first publish).
    pub fn watermark(&self) -> u64 {
        self.watermark.value()
    }

    /// Remote total already reflected in the local counter.
    pub fn absorbed(&self) -> u64 {
        self.absorbed
    }

    /// Failed attempts since the last successful publish.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    /// Run one merge attempt.
    ///
    /// Never retries: a conflict or an unreachable store is reported and the
    /// caller waits for its next scheduled tick. A peer delta folded before a
    /// failed publish stays in the counter and is remembered in `absorbed`,
    /// so the next attempt neither loses nor re-adds it.
    pub async fn tick(&mut self) -> TickOutcome {
        let observed = match self.store.read(&self.key).await {
            Ok(v) => v,
            Err(e) => {
                return self.failed(TickOutcome::Unavailable {
                    stage: StoreStage::Read,
                    reason: e.to_string(),
                })
            }
        };

        let Some(plan) = plan_merge(self.absorbed, observed, &self.counter) else {
            return self.failed(TickOutcome::Unavailable {
                stage: StoreStage::Read,
                reason: format!(
                    "record overflow: {observed} cannot be folded into local total {}",
                    self.counter.load()
                ),
            });
        };
        self.absorbed = plan.remote;
        if plan.clamped {
            warn!(
                key = %self.key,
                observed = plan.observed,
                watermark = self.watermark.value(),
                absorbed = plan.remote,
                "shared record is below our last publish; treating it as unchanged"
            );
        }

        // Expect the value actually read: the clamp changes the arithmetic,
        // not what "unchanged since read" means.
        let res = self
            .store
            .publish_if_unchanged(&self.key, plan.observed, plan.new_total)
            .await;

        match res {
            Ok(()) => {
                let advance = self.watermark.advance(plan.new_total);
                if !advance.is_accepted() {
                    error!(key = %self.key, ?advance, "published total below watermark");
                }
                self.absorbed = plan.new_total;
                self.consecutive_failures = 0;
                debug!(
                    key = %self.key,
                    total = plan.new_total,
                    remote_delta = plan.remote_delta,
                    local_delta = plan.local_delta,
                    "published counter"
                );
                TickOutcome::Published {
                    observed: plan.observed,
                    total: plan.new_total,
                    remote_delta: plan.remote_delta,
                    local_delta: plan.local_delta,
                    clamped: plan.clamped,
                }
            }
            Err(StoreError::Conflict { .. }) => self.failed(TickOutcome::Conflict {
                expected: plan.observed,
                attempted: plan.new_total,
            }),
            Err(e) => self.failed(TickOutcome::Unavailable {
                stage: StoreStage::Publish,
                reason: e.to_string(),
            }),
        }
    }

    fn failed(&mut self, outcome: TickOutcome) -> TickOutcome {
        self.consecutive_failures += 1;
        warn!(
            key = %self.key,
            local_total = self.counter.load(),
            attempt = self.consecutive_failures,
            ?outcome,
            "failed to publish counter"
        );
        outcome
    }
}
