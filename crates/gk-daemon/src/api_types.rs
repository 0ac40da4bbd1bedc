//! Response types for gk-daemon HTTP endpoints.
//!
//! `/v1/progress` serves [`gk_gate::ProgressSnapshot`] as-is.

use serde::Serialize;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /// How the gate state was obtained at boot: "fresh" | "restored" | "reset".
    pub boot_state: &'static str,
    pub active_index: usize,
}
