//! Typed results of gate operations.
//!
//! Callers render these; no user-facing text lives here.

use gk_schemas::UserId;
use serde::Serialize;

use crate::ChannelIndex;

/// Result of `RequestAccess`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The user is already in the channel. Nothing was recorded; crediting
    /// only happens through verification.
    AlreadyMember { channel: ChannelIndex },
    /// The user is (now) pending for the channel and should be shown `invite`.
    NotMember {
        channel: ChannelIndex,
        invite: String,
    },
}

impl AccessOutcome {
    pub fn channel(&self) -> ChannelIndex {
        match self {
            AccessOutcome::AlreadyMember { channel } | AccessOutcome::NotMember { channel, .. } => {
                *channel
            }
        }
    }
}

/// The active channel moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Advancement {
    /// Channel that reached its threshold and was reset.
    pub completed: usize,
    /// New `active_index`.
    pub active_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Oracle did not confirm membership (including oracle failure).
    VerificationFailed,
    /// Member, already credited this cycle. Informational.
    AlreadyCounted,
    /// Member, moved from pending to counted.
    NewlyCounted { advancement: Option<Advancement> },
    /// Member who was never prompted for this channel. Not credited.
    Uncredited,
}

/// Result of `Verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub channel: ChannelIndex,
    pub outcome: VerifyOutcome,
    /// `active_index` after the operation.
    pub active_index: usize,
}

impl VerifyReport {
    /// Any confirmed member may receive the channel's content.
    pub fn content_entitled(&self) -> bool {
        !matches!(self.outcome, VerifyOutcome::VerificationFailed)
    }

    pub fn advancement(&self) -> Option<Advancement> {
        match self.outcome {
            VerifyOutcome::NewlyCounted { advancement } => advancement,
            _ => None,
        }
    }
}

/// Result of the `/start` flow on the active channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Not a member; now pending and should be shown `invite`.
    Prompted {
        channel: ChannelIndex,
        invite: String,
    },
    /// Already a member; verified under the same mutation guard, so the
    /// report is for the channel that was active when the flow began.
    Verified(VerifyReport),
}

/// Result of executing a [`crate::GateCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResponse {
    Start(StartOutcome),
    Verify(VerifyReport),
}

/// State changes published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateEvent {
    Pending { channel: usize, user_id: UserId },
    Readmitted { channel: usize, user_id: UserId },
    Counted {
        channel: usize,
        user_id: UserId,
        join_count: u32,
    },
    Advanced(Advancement),
}

/// Read-only view for progress displays. Counts only, no user ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub active_index: usize,
    pub required_joins: u32,
    pub channels: Vec<ChannelProgressView>,
    /// Saves that failed since boot; state answered from memory meanwhile.
    pub persistence_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelProgressView {
    pub index: usize,
    pub chat_id: i64,
    pub active: bool,
    pub pending: usize,
    pub counted: usize,
    pub join_count: u32,
    /// Joins still needed before this channel (if active) advances.
    pub remaining: u32,
}
