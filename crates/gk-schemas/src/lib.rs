//! gk-schemas
//!
//! Persisted gate state: the typed in-memory record ([`GlobalState`]) and the
//! tolerant on-disk shape it is recovered from ([`PersistedState`]).
//!
//! Older files carry no `schema_version` and no `join_count`; newer files may
//! have been written against a different channel roster. All of that is
//! resolved exactly once, by [`PersistedState::repair`], when state is loaded.
//! Nothing downstream re-validates shape.
//!
//! Pure data. No IO, no clock.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk layout version.
pub const STATE_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Chat-platform user identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ChannelProgress
// ---------------------------------------------------------------------------

/// Membership bookkeeping for one channel.
///
/// `pending` and `counted` are disjoint. `join_count` mirrors `counted.len()`
/// and is kept as an explicit field because it is part of the persisted layout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProgress {
    pub pending: BTreeSet<UserId>,
    pub counted: BTreeSet<UserId>,
    pub join_count: u32,
}

impl ChannelProgress {
    /// `true` when no user appears in both sets and `join_count` is in sync.
    pub fn is_consistent(&self) -> bool {
        self.pending.is_disjoint(&self.counted) && self.join_count as usize == self.counted.len()
    }

    /// Start a new rotation cycle: both sets empty, `join_count` zero.
    pub fn reset_cycle(&mut self) {
        self.pending.clear();
        self.counted.clear();
        self.join_count = 0;
    }
}

// ---------------------------------------------------------------------------
// GlobalState
// ---------------------------------------------------------------------------

/// The whole mutable gate state. Serialized as-is by the state store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    pub schema_version: u32,
    pub active_index: usize,
    pub channels: Vec<ChannelProgress>,
    /// Stamped by the store on every successful save.
    #[serde(default)]
    pub saved_at_utc: Option<DateTime<Utc>>,
}

impl GlobalState {
    /// First-run state: channel 0 active, all progress empty.
    pub fn fresh(channel_count: usize) -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            active_index: 0,
            channels: vec![ChannelProgress::default(); channel_count],
            saved_at_utc: None,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Structural invariants: valid active index and every channel consistent.
    pub fn is_consistent(&self) -> bool {
        self.active_index < self.channels.len().max(1)
            && self.channels.iter().all(ChannelProgress::is_consistent)
    }
}

// ---------------------------------------------------------------------------
// PersistedState: tolerant decode target
// ---------------------------------------------------------------------------

/// State as read back from storage. Every field is optional so that any
/// historical layout decodes; [`PersistedState::repair`] turns it into a
/// [`GlobalState`] for the configured roster.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub active_index: Option<i64>,
    #[serde(default)]
    pub channels: Option<Vec<PersistedChannel>>,
    #[serde(default)]
    pub saved_at_utc: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PersistedChannel {
    #[serde(default)]
    pub pending: Option<Vec<i64>>,
    #[serde(default)]
    pub counted: Option<Vec<i64>>,
    #[serde(default)]
    pub join_count: Option<i64>,
}

/// What [`PersistedState::repair`] had to change. Logged once at boot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// `schema_version` found on disk (`None` for pre-versioned files).
    pub from_version: Option<u32>,
    pub channels_padded: usize,
    pub channels_truncated: usize,
    pub active_index_reset: bool,
    /// Users found in both `pending` and `counted`; kept in `counted`.
    pub overlaps_resolved: usize,
    /// Non-positive user ids dropped.
    pub invalid_ids_dropped: usize,
    pub join_counts_corrected: usize,
}

impl RepairReport {
    pub fn migrated(&self) -> bool {
        self.from_version != Some(STATE_SCHEMA_VERSION)
    }

    /// `true` when the stored record was already current and well-formed.
    pub fn is_clean(&self) -> bool {
        !self.migrated()
            && self.channels_padded == 0
            && self.channels_truncated == 0
            && !self.active_index_reset
            && self.overlaps_resolved == 0
            && self.invalid_ids_dropped == 0
            && self.join_counts_corrected == 0
    }
}

impl PersistedState {
    /// Repair into a [`GlobalState`] sized for `channel_count` channels.
    ///
    /// | Condition                          | Repair                              |
    /// |------------------------------------|-------------------------------------|
    /// | fewer channels than configured     | pad with empty progress             |
    /// | more channels than configured      | truncate                            |
    /// | `active_index` missing/out of range| reset to 0                          |
    /// | user id ≤ 0                        | dropped                             |
    /// | user in `pending` and `counted`    | kept in `counted` only              |
    /// | `join_count` ≠ `|counted|`         | recomputed                          |
    pub fn repair(self, channel_count: usize) -> (GlobalState, RepairReport) {
        let mut report = RepairReport {
            from_version: self.schema_version,
            ..RepairReport::default()
        };

        let mut raw_channels = self.channels.unwrap_or_default();
        if raw_channels.len() > channel_count {
            report.channels_truncated = raw_channels.len() - channel_count;
            raw_channels.truncate(channel_count);
        }

        let mut channels: Vec<ChannelProgress> = raw_channels
            .into_iter()
            .map(|raw| repair_channel(raw, &mut report))
            .collect();

        while channels.len() < channel_count {
            channels.push(ChannelProgress::default());
            report.channels_padded += 1;
        }

        let active_index = match self.active_index {
            Some(i) if i >= 0 && (i as usize) < channel_count => i as usize,
            _ => {
                report.active_index_reset = true;
                0
            }
        };

        let state = GlobalState {
            schema_version: STATE_SCHEMA_VERSION,
            active_index,
            channels,
            saved_at_utc: self.saved_at_utc,
        };
        (state, report)
    }
}

fn repair_channel(raw: PersistedChannel, report: &mut RepairReport) -> ChannelProgress {
    let mut keep_valid = |ids: Option<Vec<i64>>| -> BTreeSet<UserId> {
        let mut out = BTreeSet::new();
        for id in ids.unwrap_or_default() {
            if id > 0 {
                out.insert(UserId(id));
            } else {
                report.invalid_ids_dropped += 1;
            }
        }
        out
    };

    let counted = keep_valid(raw.counted);
    let mut pending = keep_valid(raw.pending);

    let before = pending.len();
    pending.retain(|u| !counted.contains(u));
    report.overlaps_resolved += before - pending.len();

    let join_count = counted.len() as u32;
    // Pre-versioned files never stored join_count; absence is not a correction.
    if let Some(stored) = raw.join_count {
        if stored != i64::from(join_count) {
            report.join_counts_corrected += 1;
        }
    }

    ChannelProgress {
        pending,
        counted,
        join_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> PersistedState {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn fresh_state_is_consistent() {
        let st = GlobalState::fresh(3);
        assert_eq!(st.active_index, 0);
        assert_eq!(st.channel_count(), 3);
        assert!(st.is_consistent());
    }

    #[test]
    fn current_layout_repairs_clean() {
        let p = decode(
            r#"{"schema_version":1,"active_index":1,
                "channels":[{"pending":[5],"counted":[7],"join_count":1},
                            {"pending":[],"counted":[],"join_count":0}]}"#,
        );
        let (st, report) = p.repair(2);
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(st.active_index, 1);
        assert!(st.channels[0].counted.contains(&UserId(7)));
        assert!(st.channels[0].pending.contains(&UserId(5)));
    }

    #[test]
    fn unversioned_layout_is_migrated() {
        let p = decode(r#"{"active_index":0,"channels":[{"pending":[1,2],"counted":[3]}]}"#);
        let (st, report) = p.repair(1);
        assert!(report.migrated());
        assert_eq!(report.join_counts_corrected, 0);
        assert_eq!(st.schema_version, STATE_SCHEMA_VERSION);
        assert_eq!(st.channels[0].join_count, 1);
    }

    #[test]
    fn short_channel_list_is_padded_and_long_list_truncated() {
        let p = decode(r#"{"schema_version":1,"active_index":0,"channels":[{}]}"#);
        let (st, report) = p.repair(3);
        assert_eq!(st.channel_count(), 3);
        assert_eq!(report.channels_padded, 2);

        let p = decode(r#"{"schema_version":1,"active_index":0,"channels":[{},{},{},{}]}"#);
        let (st, report) = p.repair(2);
        assert_eq!(st.channel_count(), 2);
        assert_eq!(report.channels_truncated, 2);
    }

    #[test]
    fn out_of_range_active_index_resets_to_zero() {
        for raw in ["-1", "3", "null"] {
            let json = format!(r#"{{"schema_version":1,"active_index":{raw},"channels":[]}}"#);
            let (st, report) = decode(&json).repair(3);
            assert_eq!(st.active_index, 0, "active_index={raw}");
            assert!(report.active_index_reset);
        }
    }

    #[test]
    fn overlap_is_resolved_in_favour_of_counted() {
        let p = decode(
            r#"{"schema_version":1,"active_index":0,
                "channels":[{"pending":[9,10],"counted":[9],"join_count":1}]}"#,
        );
        let (st, report) = p.repair(1);
        assert_eq!(report.overlaps_resolved, 1);
        assert!(!st.channels[0].pending.contains(&UserId(9)));
        assert!(st.channels[0].counted.contains(&UserId(9)));
        assert!(st.is_consistent());
    }

    #[test]
    fn stale_join_count_and_bad_ids_are_corrected() {
        let p = decode(
            r#"{"schema_version":1,"active_index":0,
                "channels":[{"pending":[0,-4],"counted":[11,11],"join_count":7}]}"#,
        );
        let (st, report) = p.repair(1);
        assert_eq!(report.invalid_ids_dropped, 2);
        assert_eq!(report.join_counts_corrected, 1);
        assert_eq!(st.channels[0].join_count, 1);
        assert!(st.channels[0].pending.is_empty());
    }

    #[test]
    fn reset_cycle_empties_both_sets() {
        let mut ch = ChannelProgress::default();
        ch.pending.insert(UserId(1));
        ch.counted.insert(UserId(2));
        ch.join_count = 1;
        ch.reset_cycle();
        assert_eq!(ch, ChannelProgress::default());
    }
}
