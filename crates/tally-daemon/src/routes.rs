//! Axum router and all HTTP handlers for tally-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers, so tests can drive the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::{
    api_types::{HealthResponse, StatusResponse},
    state::{uptime_secs, AppState, BusMsg},
};

/// Longest accepted `POST /` body; `u64::MAX` has 20 digits.
pub const MAX_INCREMENT_BODY_LEN: usize = 20;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_total).post(increment))
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /  POST /
// ---------------------------------------------------------------------------

pub(crate) async fn get_total(State(st): State<Arc<AppState>>) -> String {
    st.boundary.get_total().to_string()
}

/// Add the decimal amount in the body and return the new local total.
///
/// Anything that is not a bounded decimal number is a bare `400`; the
/// counter is only touched once the amount is known to be acceptable.
pub(crate) async fn increment(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    let Some(n) = parse_amount(&body) else {
        debug!(len = body.len(), "rejected malformed increment body");
        return StatusCode::BAD_REQUEST.into_response();
    };

    match st.boundary.increment_by(n) {
        Ok(total) => total.to_string().into_response(),
        Err(rejected) => {
            debug!(%rejected, "rejected increment");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

fn parse_amount(body: &[u8]) -> Option<u64> {
    if body.is_empty() || body.len() > MAX_INCREMENT_BODY_LEN {
        return None;
    }
    let text = std::str::from_utf8(body).ok()?.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let reconcile = st.reconcile.read().await.clone();
    (
        StatusCode::OK,
        Json(StatusResponse {
            node_id: st.node_id,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            total: st.boundary.get_total(),
            max_increment: st.boundary.max_increment(),
            counter_key: st.counter_key.clone(),
            backend: st.backend.to_string(),
            reconcile,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        // Lagged receivers skip what they missed.
        let m = msg.ok()?;
        let data = serde_json::to_string(&m).ok()?;
        Some(Ok(Event::default().event(m.event_name()).data(data)))
    })
}
