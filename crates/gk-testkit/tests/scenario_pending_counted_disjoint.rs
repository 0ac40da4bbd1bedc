//! Scenario: pending and counted never overlap
//!
//! Drives a long, deterministic mix of prompts, joins, departures, verifies
//! and outages across several channels and checks every snapshot (in memory
//! and persisted) for overlap and `join_count` drift.

use gk_oracle::{MembershipStatus, OracleError};
use gk_schemas::{GlobalState, UserId};
use gk_testkit::{chat_id, GateHarness};

/// Small LCG so the sequence is reproducible without a rand dependency.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn assert_disjoint(st: &GlobalState, step: usize) {
    for (i, ch) in st.channels.iter().enumerate() {
        assert!(
            ch.pending.is_disjoint(&ch.counted),
            "step {step}: channel {i} overlap {:?}",
            ch.pending.intersection(&ch.counted).collect::<Vec<_>>()
        );
        assert_eq!(ch.join_count as usize, ch.counted.len(), "step {step}: channel {i}");
    }
    assert!(st.active_index < st.channels.len());
}

#[tokio::test]
async fn random_walk_keeps_sets_disjoint() {
    const CHANNELS: usize = 4;
    let h = GateHarness::new(CHANNELS, 3);
    let mut rng = Lcg(0x5eed);

    for step in 0..2_000 {
        let user = UserId(1 + rng.next(12) as i64);
        let channel = rng.next(CHANNELS as u64) as usize;
        match rng.next(7) {
            0 => {
                h.gate.request_access(user).await;
            }
            1 => {
                let idx = h.gate.roster().resolve(channel as i64).unwrap();
                h.gate.request_access_at(user, idx).await;
            }
            2 => h.join(user, channel),
            3 => h.leave(user, channel),
            4 => h
                .oracle
                .set_status(chat_id(channel), user, MembershipStatus::Kicked),
            5 => {
                if rng.next(10) == 0 {
                    h.oracle.begin_outage(OracleError::Timeout);
                } else {
                    h.oracle.end_outage();
                }
            }
            _ => {
                h.gate.verify(user, channel as i64).await.unwrap();
            }
        }
        assert_disjoint(&h.gate.state_snapshot().await, step);
        if let Some(saved) = h.store.last_saved() {
            assert_disjoint(&saved, step);
        }
    }
}
