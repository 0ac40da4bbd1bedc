//! Shared runtime state for gk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The gate itself owns
//! all mutable gate state; this module only adds the event bus and build info.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use gk_gate::{GateController, GateEvent};
use gk_store::RecoveryOrigin;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

/// Payload of the SSE bus.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Gate { event: GateEvent },
}

impl BusMsg {
    /// SSE `event:` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Gate { .. } => "gate",
        }
    }
}

/// Reported by `/v1/health`.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub gate: Arc<GateController>,
}

impl AppState {
    pub fn new(gate: Arc<GateController>) -> Self {
        let (bus, _) = broadcast::channel(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "gk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            gate,
        }
    }

    /// "fresh" | "restored" | "reset"
    pub fn boot_state(&self) -> &'static str {
        match self.gate.recovery_origin() {
            RecoveryOrigin::Fresh => "fresh",
            RecoveryOrigin::Restored { .. } => "restored",
            RecoveryOrigin::Reset { .. } => "reset",
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since the first call.
pub fn uptime_secs() -> u64 {
    static STARTED: OnceLock<Instant> = OnceLock::new();
    STARTED.get_or_init(Instant::now).elapsed().as_secs()
}

/// Heartbeat on the bus every `interval`. Send errors mean nobody listens.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts_millis = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis });
        }
    });
}

/// Forward gate events onto the SSE bus until the gate is dropped.
pub fn spawn_gate_relay(gate: &GateController, bus: broadcast::Sender<BusMsg>) {
    let mut rx = gate.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let _ = bus.send(BusMsg::Gate { event: ev });
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "gate event relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
