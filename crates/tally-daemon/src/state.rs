//! Shared runtime state for tally-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The reconcile engine is
//! not part of the state: it is moved into the single reconcile task, which
//! reports each outcome back through [`AppState::record_tick`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_reconcile::{CounterBoundary, ReconcileEngine, TickOutcome};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Reconcile { local_total: u64, result: TickOutcome },
    LogLine { level: String, msg: String },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Reconcile { .. } => "reconcile",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// ReconcileStatus
// ---------------------------------------------------------------------------

/// Running summary of reconcile ticks, returned inside GET /v1/status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileStatus {
    pub ticks: u64,
    pub published: u64,
    pub conflicts: u64,
    pub unavailable: u64,
    pub consecutive_failures: u64,
    pub last_published_total: Option<u64>,
    pub last_published_at: Option<DateTime<Utc>>,
    /// "published" | "conflict" | "unavailable"; `None` before the first tick.
    pub last_outcome: Option<String>,
}

impl ReconcileStatus {
    /// Fold one tick outcome into the summary.
    pub fn record(&mut self, outcome: &TickOutcome, consecutive_failures: u64, at: DateTime<Utc>) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Published { total, .. } => {
                self.published += 1;
                self.last_published_total = Some(*total);
                self.last_published_at = Some(at);
            }
            TickOutcome::Conflict { .. } => self.conflicts += 1,
            TickOutcome::Unavailable { .. } => self.unavailable += 1,
        }
        self.consecutive_failures = consecutive_failures;
        self.last_outcome = Some(outcome.label().to_string());
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    /// Random per-process id, so peers are distinguishable in logs.
    pub node_id: Uuid,
    /// The only way handlers touch the counter.
    pub boundary: CounterBoundary,
    pub counter_key: String,
    pub backend: &'static str,
    pub reconcile: Arc<RwLock<ReconcileStatus>>,
}

impl AppState {
    pub fn new(boundary: CounterBoundary, counter_key: impl Into<String>, backend: &'static str) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "tally-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            node_id: Uuid::new_v4(),
            boundary,
            counter_key: counter_key.into(),
            backend,
            reconcile: Arc::new(RwLock::new(ReconcileStatus::default())),
        }
    }

    /// Update the reconcile summary and announce the outcome on the bus.
    pub async fn record_tick(&self, outcome: &TickOutcome, consecutive_failures: u64) {
        {
            let mut rs = self.reconcile.write().await;
            rs.record(outcome, consecutive_failures, Utc::now());
        }
        let _ = self.bus.send(BusMsg::Reconcile {
            local_total: self.boundary.get_total(),
            result: outcome.clone(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`
/// while at least one `/v1/stream` client is subscribed.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if bus.receiver_count() == 0 {
                continue;
            }
            let ts = Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    })
}

/// Run one reconcile attempt and report it. Used for startup priming and by
/// the reconcile loop.
pub async fn run_tick(state: &AppState, engine: &mut ReconcileEngine) -> TickOutcome {
    let outcome = engine.tick().await;
    state
        .record_tick(&outcome, engine.consecutive_failures())
        .await;
    outcome
}

/// Spawn the reconcile task. It owns `engine` for its whole life.
///
/// The first tick fires one `interval` after the call (startup priming has
/// already done one). Each attempt is awaited before the next tick is
/// awaited, so attempts never overlap; a slow attempt delays the schedule
/// rather than bunching ticks up.
pub fn spawn_reconcile_loop(
    state: Arc<AppState>,
    mut engine: ReconcileEngine,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            key = engine.key(),
            backend = engine.backend_name(),
            interval_ms = interval.as_millis() as u64,
            "reconcile loop started"
        );

        loop {
            ticker.tick().await;
            let outcome = run_tick(&state, &mut engine).await;

            // Surface the first failure of a streak to SSE viewers; the
            // engine already logs every attempt.
            if !outcome.is_published() && engine.consecutive_failures() == 1 {
                let msg = format!("reconcile {} for key {}", outcome.label(), engine.key());
                warn!(%msg, "reconcile failing");
                let _ = state.bus.send(BusMsg::LogLine {
                    level: "WARN".to_string(),
                    msg,
                });
            }
        }
    })
}
