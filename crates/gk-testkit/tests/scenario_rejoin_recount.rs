//! Scenario: leaving and rejoining earns a second credit
//!
//! Counted → (oracle reports Left) → Pending → Counted.

use gk_gate::{AccessOutcome, VerifyOutcome};
use gk_oracle::MembershipStatus;
use gk_schemas::UserId;
use gk_testkit::{chat_id, GateHarness};

#[tokio::test]
async fn departure_seen_on_verify_then_rejoin_counts_again() {
    let h = GateHarness::new(2, 10);
    let u = UserId(77);

    h.prompt_join_verify(u, 0).await;
    assert_eq!(h.gate.state_snapshot().await.channels[0].join_count, 1);

    h.leave(u, 0);
    let report = h.gate.verify(u, 0).await.unwrap();
    assert_eq!(report.outcome, VerifyOutcome::VerificationFailed);
    let st = h.gate.state_snapshot().await;
    assert!(st.channels[0].pending.contains(&u));
    assert!(!st.channels[0].counted.contains(&u));
    assert_eq!(st.channels[0].join_count, 0);

    h.join(u, 0);
    let report = h.gate.verify(u, 0).await.unwrap();
    assert_eq!(report.outcome, VerifyOutcome::NewlyCounted { advancement: None });
    assert_eq!(h.gate.state_snapshot().await.channels[0].join_count, 1);
}

#[tokio::test]
async fn departure_seen_on_request_access_readmits() {
    let h = GateHarness::new(1, 10);
    let u = UserId(78);
    h.prompt_join_verify(u, 0).await;

    h.oracle.set_status(chat_id(0), u, MembershipStatus::Kicked);
    let out = h.gate.request_access(u).await;
    assert!(matches!(out, AccessOutcome::NotMember { .. }));
    assert!(h.gate.state_snapshot().await.channels[0].pending.contains(&u));

    h.join(u, 0);
    let report = h.gate.verify(u, 0).await.unwrap();
    assert!(matches!(report.outcome, VerifyOutcome::NewlyCounted { .. }));
}
