//! Response types for the JSON endpoints. The counter endpoints (`GET /`,
//! `POST /`) speak plain text and have no types here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::ReconcileStatus;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub node_id: Uuid,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Local running total, as `GET /` would return it.
    pub total: u64,
    pub max_increment: u64,
    pub counter_key: String,
    pub backend: String,
    pub reconcile: ReconcileStatus,
}
