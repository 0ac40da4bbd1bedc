//! gk-oracle
//!
//! Membership oracle boundary: "is this user in that channel right now?"
//!
//! The gate consults an oracle and never owns one. This crate defines the
//! [`MembershipOracle`] contract and the Bot API implementation
//! ([`TelegramMembershipOracle`]). Adapters own their timeout and surface it as
//! [`OracleError::Timeout`]; deciding what an error *means* (fail-closed) is
//! the caller's job.

pub mod bot_api;
mod telegram;

use std::fmt;

use gk_schemas::UserId;
use serde::{Deserialize, Serialize};

pub use telegram::TelegramMembershipOracle;

// ---------------------------------------------------------------------------
// MembershipStatus
// ---------------------------------------------------------------------------

/// A user's standing in a channel as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Member,
    Admin,
    Creator,
    Left,
    Kicked,
    Unknown,
}

impl MembershipStatus {
    /// `Member`, `Admin` and `Creator` all count as membership for gating.
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            MembershipStatus::Member | MembershipStatus::Admin | MembershipStatus::Creator
        )
    }

    /// The platform explicitly reports the user as gone.
    pub fn has_departed(&self) -> bool {
        matches!(self, MembershipStatus::Left | MembershipStatus::Kicked)
    }

    /// Map a Bot API `ChatMember.status` string.
    ///
    /// `restricted` members carry an `is_member` flag; anything unrecognised is
    /// `Unknown`.
    pub fn from_bot_api(status: &str, is_member: Option<bool>) -> Self {
        match status {
            "creator" => MembershipStatus::Creator,
            "administrator" => MembershipStatus::Admin,
            "member" => MembershipStatus::Member,
            "restricted" if is_member == Some(true) => MembershipStatus::Member,
            "left" => MembershipStatus::Left,
            "kicked" => MembershipStatus::Kicked,
            _ => MembershipStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Member => "member",
            MembershipStatus::Admin => "admin",
            MembershipStatus::Creator => "creator",
            MembershipStatus::Left => "left",
            MembershipStatus::Kicked => "kicked",
            MembershipStatus::Unknown => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an oracle implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Network or transport failure.
    Transport(String),
    /// The adapter's own deadline elapsed.
    Timeout,
    /// Credentials rejected, or the bot lacks rights in the channel.
    Unauthorized(String),
    /// The platform answered with an application-level error.
    Api { code: Option<i64>, description: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The adapter could not be constructed.
    Config(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Transport(msg) => write!(f, "transport error: {msg}"),
            OracleError::Timeout => write!(f, "membership check timed out"),
            OracleError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            OracleError::Api {
                code: Some(c),
                description,
            } => write!(f, "bot api error code={c}: {description}"),
            OracleError::Api {
                code: None,
                description,
            } => write!(f, "bot api error: {description}"),
            OracleError::Decode(msg) => write!(f, "decode error: {msg}"),
            OracleError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for OracleError {}

// ---------------------------------------------------------------------------
// Oracle trait
// ---------------------------------------------------------------------------

/// Membership check contract.
///
/// Object-safe so the gate can hold an `Arc<dyn MembershipOracle>`; `Send +
/// Sync` so checks can be awaited from any task.
#[async_trait::async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Short name for logs (e.g. `"telegram"`).
    fn name(&self) -> &'static str;

    /// Report `user`'s status in the channel identified by `chat_id`.
    async fn check_status(
        &self,
        chat_id: i64,
        user: UserId,
    ) -> Result<MembershipStatus, OracleError>;
}
