use serde::{Deserialize, Serialize};

/// Arithmetic of one merge attempt, captured after the atomic fold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergePlan {
    /// Record value as read from the store.
    pub observed: u64,
    /// `observed`, raised to the absorbed total if it had fallen below it.
    pub remote: u64,
    /// `true` when `observed` was below the absorbed total.
    pub clamped: bool,
    /// Peer contribution not yet folded in (`remote - absorbed`).
    pub remote_delta: u64,
    /// Counter value immediately before the remote delta was folded in.
    pub snapshot: u64,
    /// Our contribution not yet published (`snapshot - absorbed`).
    pub local_delta: u64,
    /// Total to publish (`remote + local_delta`).
    pub new_total: u64,
}

/// Which store call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreStage {
    Read,
    Publish,
}

/// Result of one reconcile tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// The publish committed; the watermark is now `total`.
    Published {
        observed: u64,
        total: u64,
        remote_delta: u64,
        local_delta: u64,
        clamped: bool,
    },

    /// Another peer published between our read and our publish.
    Conflict { expected: u64, attempted: u64 },

    /// The store could not be reached (or held a malformed value).
    Unavailable { stage: StoreStage, reason: String },
}

impl TickOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, TickOutcome::Published { .. })
    }

    /// Stable label for logs and status responses.
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Published { .. } => "published",
            TickOutcome::Conflict { .. } => "conflict",
            TickOutcome::Unavailable { .. } => "unavailable",
        }
    }
}
