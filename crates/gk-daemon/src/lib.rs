//! gk-daemon library target.
//!
//! Exposes the router, shared state and the chat dispatcher for integration
//! tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod dispatch;
pub mod routes;
pub mod state;
pub mod telegram;
pub mod wiring;
