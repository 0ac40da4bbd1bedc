//! gk-gate
//!
//! The rotating channel gate.
//!
//! A user unlocks the active channel's content by joining it and passing
//! verification. Each (user, channel) pair moves through
//! `Unseen → Pending → Counted`; once `required_joins` users are counted for
//! the active channel, the rotation advances to the next channel (wrapping).
//!
//! - [`rotation`] holds the transitions as pure functions over
//!   [`gk_schemas::GlobalState`]. No IO, no locks.
//! - [`GateController`] wraps them with the membership oracle, the state
//!   store and a single mutation lock so concurrent requests never interleave.
//! - [`GateCommand`] is the typed request surface; malformed callbacks are
//!   rejected before they reach the controller.

mod command;
mod controller;
mod error;
mod outcome;
mod roster;
pub mod rotation;

pub use command::{GateCommand, VERIFY_CALLBACK_PREFIX};
pub use controller::GateController;
pub use error::GateError;
pub use outcome::{
    AccessOutcome, Advancement, ChannelProgressView, GateEvent, GateResponse, ProgressSnapshot,
    StartOutcome, VerifyOutcome, VerifyReport,
};
pub use roster::{Channel, ChannelIndex, ChannelRoster, EmptyRoster};
