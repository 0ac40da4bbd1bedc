//! Scenario: Verify is idempotent per (user, channel, cycle)
//!
//! # Invariants under test
//!
//! 1. A second Verify by an already-counted member returns AlreadyCounted and
//!    leaves `join_count` unchanged.
//! 2. A member who was never prompted is not credited, but is still entitled
//!    to content.

use gk_gate::VerifyOutcome;
use gk_schemas::UserId;
use gk_testkit::GateHarness;

#[tokio::test]
async fn second_verify_is_already_counted() {
    let h = GateHarness::new(3, 5);
    let u = UserId(42);

    let first = h.prompt_join_verify(u, 0).await;
    assert_eq!(first.outcome, VerifyOutcome::NewlyCounted { advancement: None });

    let saves_after_first = h.store.saves();
    let second = h.gate.verify(u, 0).await.unwrap();
    assert_eq!(second.outcome, VerifyOutcome::AlreadyCounted);
    assert!(second.content_entitled());

    let st = h.gate.state_snapshot().await;
    assert_eq!(st.channels[0].join_count, 1);
    assert_eq!(st.channels[0].counted.len(), 1);
    assert_eq!(
        h.store.saves(),
        saves_after_first,
        "no-op verify must not write"
    );
}

#[tokio::test]
async fn unprompted_member_is_entitled_but_not_credited() {
    let h = GateHarness::new(2, 1);
    let u = UserId(7);
    h.join(u, 0);

    let report = h.gate.verify(u, 0).await.unwrap();
    assert_eq!(report.outcome, VerifyOutcome::Uncredited);
    assert!(report.content_entitled());
    assert_eq!(report.active_index, 0, "uncredited verify must not advance");

    let st = h.gate.state_snapshot().await;
    assert!(st.channels[0].counted.is_empty());
    assert!(st.channels[0].pending.is_empty());
}
