//! Axum router and HTTP handlers for gk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! the trace layer. The surface is read-only: all gate mutations arrive
//! through the chat dispatcher.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    api_types::HealthResponse,
    state::{uptime_secs, AppState},
};

pub const LIVENESS_TEXT: &str = "gatekeeper bot is running";

/// Bare router; `main.rs` adds the trace layer.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/v1/health", get(health))
        .route("/v1/progress", get(progress))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

pub(crate) async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

/// `GET /v1/health`
pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let active = st.gate.active_channel().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            uptime_secs: uptime_secs(),
            boot_state: st.boot_state(),
            active_index: active.get(),
        }),
    )
}

/// `GET /v1/progress`: per-channel counters and the persistence failure tally.
pub(crate) async fn progress(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.gate.progress().await))
}

/// `GET /v1/stream`: heartbeats and gate events as SSE. Lagged receivers
/// skip what they missed.
pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let events = BroadcastStream::new(st.bus.subscribe()).filter_map(|msg| async move {
        let msg = msg.ok()?;
        let data = serde_json::to_string(&msg).ok()?;
        Some(Ok::<_, Infallible>(
            Event::default().event(msg.event_name()).data(data),
        ))
    });

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(events).keep_alive(KeepAlive::new()),
    )
        .into_response()
}
