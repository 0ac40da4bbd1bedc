use std::fmt;

use serde::Serialize;

use crate::GateError;

/// A gated channel. Static for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub chat_id: i64,
    pub invite: String,
}

impl Channel {
    pub fn new(chat_id: i64, invite: impl Into<String>) -> Self {
        Self {
            chat_id,
            invite: invite.into(),
        }
    }
}

/// Position in the rotation, known to be in range for the roster that
/// produced it. Only [`ChannelRoster`] constructs these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelIndex(usize);

impl ChannelIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ChannelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyRoster;

impl fmt::Display for EmptyRoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel roster must contain at least one channel")
    }
}

impl std::error::Error for EmptyRoster {}

/// Ordered, non-empty channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRoster {
    channels: Vec<Channel>,
}

impl ChannelRoster {
    pub fn new(channels: Vec<Channel>) -> Result<Self, EmptyRoster> {
        if channels.is_empty() {
            return Err(EmptyRoster);
        }
        Ok(Self { channels })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Validate a raw (possibly negative) index from an untrusted source.
    pub fn resolve(&self, raw: i64) -> Result<ChannelIndex, GateError> {
        match usize::try_from(raw) {
            Ok(i) if i < self.channels.len() => Ok(ChannelIndex(i)),
            _ => Err(GateError::InvalidChannel {
                index: raw,
                channel_count: self.channels.len(),
            }),
        }
    }

    /// Index for a position the caller already knows is in range
    /// (e.g. a repaired `active_index`). Out-of-range input wraps.
    pub(crate) fn wrap(&self, i: usize) -> ChannelIndex {
        ChannelIndex(i % self.channels.len())
    }

    pub fn get(&self, idx: ChannelIndex) -> &Channel {
        &self.channels[idx.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelIndex, &Channel)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(i, c)| (ChannelIndex(i), c))
    }
}
