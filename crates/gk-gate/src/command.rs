use gk_schemas::UserId;

use crate::{ChannelIndex, ChannelRoster, GateError};

/// Callback payload prefix for the verify button: `verify_<index>`.
pub const VERIFY_CALLBACK_PREFIX: &str = "verify_";

/// A validated gate request, executed by [`crate::GateController::execute`].
///
/// `Verify` carries a [`ChannelIndex`], so an out-of-range channel cannot
/// reach the controller through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCommand {
    /// `/start`: gate the active channel, verifying a member on the spot.
    Start { user: UserId },
    Verify { user: UserId, channel: ChannelIndex },
}

impl GateCommand {
    pub fn user(&self) -> UserId {
        match self {
            GateCommand::Start { user } | GateCommand::Verify { user, .. } => *user,
        }
    }

    /// Payload to attach to the verify button for `channel`.
    pub fn verify_callback_data(channel: ChannelIndex) -> String {
        format!("{VERIFY_CALLBACK_PREFIX}{channel}")
    }

    /// Parse a button callback payload.
    ///
    /// A non-numeric or unprefixed payload is `MalformedRequest`; a numeric one
    /// outside the roster is `InvalidChannel`, including integers too wide for
    /// `i64` (these saturate).
    pub fn parse_callback(
        user: UserId,
        data: &str,
        roster: &ChannelRoster,
    ) -> Result<Self, GateError> {
        let raw = data.strip_prefix(VERIFY_CALLBACK_PREFIX).ok_or_else(|| {
            GateError::MalformedRequest(format!("unknown callback payload '{data}'"))
        })?;
        let index = parse_index(raw.trim()).ok_or_else(|| {
            GateError::MalformedRequest(format!("callback channel '{raw}' is not an integer"))
        })?;
        let channel = roster.resolve(index)?;
        Ok(GateCommand::Verify { user, channel })
    }

    /// Parse a text message. Only `/start` (optionally `/start@bot` or with a
    /// deep-link payload) maps to a command; anything else is `None`.
    pub fn parse_text(user: UserId, text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let command = first.split('@').next().unwrap_or(first);
        if command == "/start" {
            Some(GateCommand::Start { user })
        } else {
            None
        }
    }
}

/// Signed decimal integer, saturating at the `i64` bounds.
fn parse_index(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(raw.parse().unwrap_or(if negative { i64::MIN } else { i64::MAX }))
}
