//! Test doubles and fixtures for the gate.
//!
//! No network, no filesystem. Everything is deterministic unless a test opts
//! into oracle latency.

mod oracle;
mod store;

use std::num::NonZeroU32;
use std::sync::Arc;

use gk_gate::{Channel, ChannelRoster, GateController};
use gk_schemas::UserId;

pub use oracle::ScriptedOracle;
pub use store::MemoryStateStore;

/// Chat id of fixture channel `i`.
pub fn chat_id(i: usize) -> i64 {
    -1_000_000 - i as i64
}

/// Invite link of fixture channel `i`.
pub fn invite(i: usize) -> String {
    format!("https://t.me/+fixture{i}")
}

/// Roster of `n` fixture channels.
pub fn roster(n: usize) -> ChannelRoster {
    match ChannelRoster::new((0..n).map(|i| Channel::new(chat_id(i), invite(i))).collect()) {
        Ok(r) => r,
        Err(e) => panic!("fixture roster: {e}"),
    }
}

/// A controller wired to a scripted oracle and an in-memory store.
pub struct GateHarness {
    pub gate: Arc<GateController>,
    pub oracle: Arc<ScriptedOracle>,
    pub store: Arc<MemoryStateStore>,
}

impl GateHarness {
    pub fn new(channels: usize, required_joins: u32) -> Self {
        Self::with_parts(
            channels,
            required_joins,
            Arc::new(ScriptedOracle::new()),
            Arc::new(MemoryStateStore::new()),
        )
    }

    pub fn with_parts(
        channels: usize,
        required_joins: u32,
        oracle: Arc<ScriptedOracle>,
        store: Arc<MemoryStateStore>,
    ) -> Self {
        let Some(required) = NonZeroU32::new(required_joins) else {
            panic!("required_joins must be >= 1");
        };
        let gate = GateController::boot(roster(channels), required, oracle.clone(), store.clone());
        Self {
            gate: Arc::new(gate),
            oracle,
            store,
        }
    }

    /// Boot a second controller from this harness's store, as after a restart.
    pub fn restart(&self, channels: usize, required_joins: u32) -> Self {
        Self::with_parts(
            channels,
            required_joins,
            self.oracle.clone(),
            self.store.clone(),
        )
    }

    /// Make `user` a member of channel `i`.
    pub fn join(&self, user: UserId, i: usize) {
        self.oracle.set_member(chat_id(i), user);
    }

    /// Make `user` a departed (left) non-member of channel `i`.
    pub fn leave(&self, user: UserId, i: usize) {
        self.oracle
            .set_status(chat_id(i), user, gk_oracle::MembershipStatus::Left);
    }

    /// Prompt then verify `user` on channel `i`, the normal happy path.
    pub async fn prompt_join_verify(&self, user: UserId, i: usize) -> gk_gate::VerifyReport {
        let channel = match self.gate.roster().resolve(i as i64) {
            Ok(c) => c,
            Err(e) => panic!("fixture channel {i}: {e}"),
        };
        self.gate.request_access_at(user, channel).await;
        self.join(user, i);
        self.gate.verify_at(user, channel).await
    }
}
