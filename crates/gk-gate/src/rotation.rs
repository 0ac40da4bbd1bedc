//! Rotation transitions.
//!
//! # Invariants
//!
//! - **Disjoint sets**: for every channel, a user is in at most one of
//!   `pending` and `counted`, and `join_count == counted.len()`.
//!
//! - **Credit through pending only**: `Pending → Counted` is the only way into
//!   `counted`. A member who was never prompted is not credited.
//!
//! - **Advance only the active channel**: reaching the threshold on any other
//!   channel changes nothing about the rotation.
//!
//! - **Advancement starts a new cycle**: the completed channel's `pending` and
//!   `counted` are emptied and `join_count` drops to zero. Users prompted
//!   during the closing cycle must be prompted again.
//!
//! Every function here is pure: no IO, no locks, no clock. Callers must pass a
//! channel index that is in range for `state.channels`.

use gk_schemas::{GlobalState, UserId};

use crate::Advancement;

// ---------------------------------------------------------------------------
// RequestAccess (non-member path)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Unseen → Pending.
    Added,
    /// Counted user who has since left: Counted → Pending, `join_count - 1`.
    Readmitted,
    /// Already pending; no change.
    AlreadyPending,
    /// Counted and not known to have left (e.g. oracle could not tell).
    /// Left counted; no change.
    StillCounted,
}

impl Admission {
    pub fn changed_state(&self) -> bool {
        matches!(self, Admission::Added | Admission::Readmitted)
    }
}

/// Record that `user` was shown the invite for `channel`.
///
/// | Current state | `departed` | Result                          |
/// |---------------|------------|---------------------------------|
/// | Unseen        | any        | `Added` (→ Pending)             |
/// | Pending       | any        | `AlreadyPending`                |
/// | Counted       | `true`     | `Readmitted` (→ Pending)        |
/// | Counted       | `false`    | `StillCounted`                  |
pub fn admit_pending(
    state: &mut GlobalState,
    channel: usize,
    user: UserId,
    departed: bool,
) -> Admission {
    let progress = &mut state.channels[channel];
    if progress.pending.contains(&user) {
        return Admission::AlreadyPending;
    }
    if progress.counted.contains(&user) {
        if !departed {
            return Admission::StillCounted;
        }
        progress.counted.remove(&user);
        progress.join_count = progress.counted.len() as u32;
        progress.pending.insert(user);
        return Admission::Readmitted;
    }
    progress.pending.insert(user);
    Admission::Added
}

/// Counted user observed as left/kicked during verification: Counted → Pending.
///
/// Returns `false` when the user was not counted.
pub fn release_departed(state: &mut GlobalState, channel: usize, user: UserId) -> bool {
    let progress = &mut state.channels[channel];
    if !progress.counted.remove(&user) {
        return false;
    }
    progress.join_count = progress.counted.len() as u32;
    progress.pending.insert(user);
    true
}

// ---------------------------------------------------------------------------
// Verify (member path)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credit {
    /// Pending → Counted. Carries the new `join_count`.
    NewlyCounted { join_count: u32 },
    AlreadyCounted,
    /// Never prompted for this channel.
    NotPending,
}

/// Credit a confirmed member.
pub fn credit(state: &mut GlobalState, channel: usize, user: UserId) -> Credit {
    let progress = &mut state.channels[channel];
    if progress.counted.contains(&user) {
        return Credit::AlreadyCounted;
    }
    if !progress.pending.remove(&user) {
        return Credit::NotPending;
    }
    progress.counted.insert(user);
    progress.join_count = progress.counted.len() as u32;
    Credit::NewlyCounted {
        join_count: progress.join_count,
    }
}

/// Advance the rotation if `channel` is active and has met `required_joins`.
pub fn evaluate_threshold(
    state: &mut GlobalState,
    channel: usize,
    required_joins: u32,
) -> Option<Advancement> {
    if channel != state.active_index {
        return None;
    }
    if (state.channels[channel].counted.len() as u64) < u64::from(required_joins) {
        return None;
    }
    Some(advance(state))
}

/// Unconditionally complete the active channel and move to the next one.
pub fn advance(state: &mut GlobalState) -> Advancement {
    let completed = state.active_index;
    state.channels[completed].reset_cycle();
    state.active_index = (completed + 1) % state.channels.len();
    Advancement {
        completed,
        active_index: state.active_index,
    }
}

/// Joins still needed on `channel` before it would advance if active.
pub fn remaining(state: &GlobalState, channel: usize, required_joins: u32) -> u32 {
    required_joins.saturating_sub(state.channels[channel].join_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: UserId = UserId(101);
    const B: UserId = UserId(102);

    #[test]
    fn admit_then_credit_then_idempotent() {
        let mut st = GlobalState::fresh(2);
        assert_eq!(admit_pending(&mut st, 0, A, false), Admission::Added);
        assert_eq!(admit_pending(&mut st, 0, A, false), Admission::AlreadyPending);
        assert_eq!(credit(&mut st, 0, A), Credit::NewlyCounted { join_count: 1 });
        assert_eq!(credit(&mut st, 0, A), Credit::AlreadyCounted);
        assert_eq!(st.channels[0].join_count, 1);
        assert!(st.is_consistent());
    }

    #[test]
    fn unprompted_member_is_not_credited() {
        let mut st = GlobalState::fresh(1);
        assert_eq!(credit(&mut st, 0, A), Credit::NotPending);
        assert!(st.channels[0].counted.is_empty());
    }

    #[test]
    fn departed_counted_user_is_readmitted() {
        let mut st = GlobalState::fresh(1);
        admit_pending(&mut st, 0, A, false);
        credit(&mut st, 0, A);

        assert_eq!(admit_pending(&mut st, 0, A, false), Admission::StillCounted);
        assert_eq!(admit_pending(&mut st, 0, A, true), Admission::Readmitted);
        assert_eq!(st.channels[0].join_count, 0);
        assert!(st.channels[0].pending.contains(&A));
        assert!(st.is_consistent());

        assert_eq!(credit(&mut st, 0, A), Credit::NewlyCounted { join_count: 1 });
    }

    #[test]
    fn release_departed_only_touches_counted_users() {
        let mut st = GlobalState::fresh(1);
        assert!(!release_departed(&mut st, 0, A));
        admit_pending(&mut st, 0, A, false);
        assert!(!release_departed(&mut st, 0, A));
        credit(&mut st, 0, A);
        assert!(release_departed(&mut st, 0, A));
        assert!(st.channels[0].pending.contains(&A));
        assert!(st.is_consistent());
    }

    #[test]
    fn threshold_advances_active_channel_only() {
        let mut st = GlobalState::fresh(3);
        for u in [A, B] {
            admit_pending(&mut st, 1, u, false);
            credit(&mut st, 1, u);
        }
        assert_eq!(evaluate_threshold(&mut st, 1, 2), None);
        assert_eq!(st.channels[1].join_count, 2);

        admit_pending(&mut st, 0, A, false);
        credit(&mut st, 0, A);
        assert_eq!(evaluate_threshold(&mut st, 0, 2), None);
        admit_pending(&mut st, 0, B, false);
        credit(&mut st, 0, B);
        assert_eq!(
            evaluate_threshold(&mut st, 0, 2),
            Some(Advancement {
                completed: 0,
                active_index: 1
            })
        );
        assert!(st.channels[0].counted.is_empty());
        assert_eq!(st.channels[0].join_count, 0);
    }

    #[test]
    fn advance_wraps_and_clears_completed_channel() {
        let mut st = GlobalState::fresh(2);
        st.active_index = 1;
        admit_pending(&mut st, 1, A, false);
        admit_pending(&mut st, 1, B, false);
        credit(&mut st, 1, B);

        let adv = advance(&mut st);
        assert_eq!(adv.active_index, 0);
        assert!(st.channels[1].pending.is_empty());
        assert!(st.channels[1].counted.is_empty());
        assert_eq!(st.channels[1].join_count, 0);

        // A's prompt belonged to the closed cycle.
        assert_eq!(credit(&mut st, 1, A), Credit::NotPending);
    }

    #[test]
    fn remaining_saturates() {
        let mut st = GlobalState::fresh(1);
        assert_eq!(remaining(&st, 0, 3), 3);
        st.channels[0].join_count = 5;
        assert_eq!(remaining(&st, 0, 3), 0);
    }
}
