//! The gate controller.
//!
//! Lock order: `mutation` then `state`. `mutation` is held for a whole
//! operation (oracle call, transition, save) so operations are linearizable.
//! `state` is write-locked only while a transition is applied, so progress
//! reads never wait on the oracle.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gk_oracle::{MembershipOracle, MembershipStatus};
use gk_schemas::{GlobalState, UserId};
use gk_store::{recover, RecoveryOrigin, StateStore};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::rotation::{self, Admission, Credit};
use crate::{
    AccessOutcome, ChannelIndex, ChannelProgressView, ChannelRoster, GateCommand, GateError,
    GateEvent, GateResponse, ProgressSnapshot, StartOutcome, VerifyOutcome, VerifyReport,
};

const EVENT_BUS_CAPACITY: usize = 1024;

pub struct GateController {
    roster: ChannelRoster,
    required_joins: NonZeroU32,
    oracle: Arc<dyn MembershipOracle>,
    store: Arc<dyn StateStore>,
    origin: RecoveryOrigin,
    mutation: Mutex<()>,
    state: RwLock<GlobalState>,
    events: broadcast::Sender<GateEvent>,
    persistence_failures: AtomicU64,
}

impl GateController {
    /// Recover state from `store` and build a controller over it.
    pub fn boot(
        roster: ChannelRoster,
        required_joins: NonZeroU32,
        oracle: Arc<dyn MembershipOracle>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let recovery = recover(store.as_ref(), roster.len());
        info!(
            channels = roster.len(),
            required_joins = required_joins.get(),
            active_index = recovery.state.active_index,
            oracle = oracle.name(),
            "gate controller booted"
        );
        Self::with_state(
            roster,
            required_joins,
            oracle,
            store,
            recovery.state,
            recovery.origin,
        )
    }

    /// Build a controller over an already-recovered state.
    pub fn with_state(
        roster: ChannelRoster,
        required_joins: NonZeroU32,
        oracle: Arc<dyn MembershipOracle>,
        store: Arc<dyn StateStore>,
        state: GlobalState,
        origin: RecoveryOrigin,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            roster,
            required_joins,
            oracle,
            store,
            origin,
            mutation: Mutex::new(()),
            state: RwLock::new(state),
            events,
            persistence_failures: AtomicU64::new(0),
        }
    }

    pub fn roster(&self) -> &ChannelRoster {
        &self.roster
    }

    pub fn required_joins(&self) -> u32 {
        self.required_joins.get()
    }

    /// How the boot state was obtained.
    pub fn recovery_origin(&self) -> &RecoveryOrigin {
        &self.origin
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.events.subscribe()
    }

    pub async fn active_channel(&self) -> ChannelIndex {
        let st = self.state.read().await;
        self.roster.wrap(st.active_index)
    }

    /// Copy of the full state, user ids included. Not for display.
    pub async fn state_snapshot(&self) -> GlobalState {
        self.state.read().await.clone()
    }

    pub async fn progress(&self) -> ProgressSnapshot {
        let st = self.state.read().await;
        let required = self.required_joins.get();
        let channels = self
            .roster
            .iter()
            .map(|(idx, channel)| {
                let i = idx.get();
                let p = &st.channels[i];
                ChannelProgressView {
                    index: i,
                    chat_id: channel.chat_id,
                    active: i == st.active_index,
                    pending: p.pending.len(),
                    counted: p.counted.len(),
                    join_count: p.join_count,
                    remaining: rotation::remaining(&st, i, required),
                }
            })
            .collect();
        ProgressSnapshot {
            active_index: st.active_index,
            required_joins: required,
            channels,
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }

    /// Run a validated command. The mutation guard covers the whole command,
    /// oracle calls included.
    pub async fn execute(&self, command: GateCommand) -> GateResponse {
        debug!(user = %command.user(), ?command, "executing gate command");
        match command {
            GateCommand::Start { user } => GateResponse::Start(self.start(user).await),
            GateCommand::Verify { user, channel } => {
                GateResponse::Verify(self.verify_at(user, channel).await)
            }
        }
    }

    /// `/start` against the active channel: a non-member is admitted to
    /// pending, a member is verified. One oracle call, one guard, so the
    /// rotation cannot move between the two halves.
    pub async fn start(&self, user: UserId) -> StartOutcome {
        let _guard = self.mutation.lock().await;
        let channel = self.active_channel().await;
        let status = self.check_membership(channel, user).await;
        if status.is_member() {
            return StartOutcome::Verified(self.verify_with(user, channel, status).await);
        }
        self.admit(user, channel, status).await;
        StartOutcome::Prompted {
            channel,
            invite: self.roster.get(channel).invite.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // RequestAccess
    // -----------------------------------------------------------------------

    /// Gate the currently active channel for `user`.
    pub async fn request_access(&self, user: UserId) -> AccessOutcome {
        let _guard = self.mutation.lock().await;
        let channel = self.active_channel().await;
        self.request_access_locked(user, channel).await
    }

    /// Gate a specific channel for `user`.
    pub async fn request_access_at(&self, user: UserId, channel: ChannelIndex) -> AccessOutcome {
        let _guard = self.mutation.lock().await;
        self.request_access_locked(user, channel).await
    }

    async fn request_access_locked(&self, user: UserId, channel: ChannelIndex) -> AccessOutcome {
        let status = self.check_membership(channel, user).await;
        if status.is_member() {
            debug!(user = %user, channel = %channel, status = status.as_str(), "already a member");
            return AccessOutcome::AlreadyMember { channel };
        }
        self.admit(user, channel, status).await;
        AccessOutcome::NotMember {
            channel,
            invite: self.roster.get(channel).invite.clone(),
        }
    }

    /// Non-member path: record `user` as pending on `channel`.
    async fn admit(&self, user: UserId, channel: ChannelIndex, status: MembershipStatus) {
        let (admission, snapshot) = {
            let mut st = self.state.write().await;
            let admission =
                rotation::admit_pending(&mut st, channel.get(), user, status.has_departed());
            (admission, admission.changed_state().then(|| st.clone()))
        };
        if let Some(snapshot) = snapshot {
            self.persist(&snapshot);
        }
        match admission {
            Admission::Added => {
                info!(user = %user, channel = %channel, "user pending");
                self.publish(GateEvent::Pending {
                    channel: channel.get(),
                    user_id: user,
                });
            }
            Admission::Readmitted => {
                info!(user = %user, channel = %channel, status = status.as_str(), "counted user departed; back to pending");
                self.publish(GateEvent::Readmitted {
                    channel: channel.get(),
                    user_id: user,
                });
            }
            Admission::AlreadyPending | Admission::StillCounted => {}
        }
    }

    // -----------------------------------------------------------------------
    // Verify
    // -----------------------------------------------------------------------

    /// Verify `user` against a raw channel index from an untrusted source.
    ///
    /// Out-of-range indices fail with `InvalidChannel` before any oracle call
    /// or state change.
    pub async fn verify(&self, user: UserId, channel: i64) -> Result<VerifyReport, GateError> {
        let channel = self.roster.resolve(channel)?;
        Ok(self.verify_at(user, channel).await)
    }

    pub async fn verify_at(&self, user: UserId, channel: ChannelIndex) -> VerifyReport {
        let _guard = self.mutation.lock().await;
        let status = self.check_membership(channel, user).await;
        self.verify_with(user, channel, status).await
    }

    /// Apply a verification given the oracle's answer. Caller holds `mutation`.
    async fn verify_with(
        &self,
        user: UserId,
        channel: ChannelIndex,
        status: MembershipStatus,
    ) -> VerifyReport {
        if !status.is_member() {
            let (snapshot, active_index) = {
                let mut st = self.state.write().await;
                let released = status.has_departed()
                    && rotation::release_departed(&mut st, channel.get(), user);
                (released.then(|| st.clone()), st.active_index)
            };
            if let Some(snapshot) = snapshot {
                self.persist(&snapshot);
                info!(user = %user, channel = %channel, status = status.as_str(), "counted user departed; back to pending");
                self.publish(GateEvent::Readmitted {
                    channel: channel.get(),
                    user_id: user,
                });
            }
            debug!(user = %user, channel = %channel, status = status.as_str(), "verification failed");
            return VerifyReport {
                channel,
                outcome: VerifyOutcome::VerificationFailed,
                active_index,
            };
        }

        let (credit, advancement, active_index, snapshot) = {
            let mut st = self.state.write().await;
            let credit = rotation::credit(&mut st, channel.get(), user);
            let advancement = match credit {
                Credit::NewlyCounted { .. } => rotation::evaluate_threshold(
                    &mut st,
                    channel.get(),
                    self.required_joins.get(),
                ),
                _ => None,
            };
            let snapshot = matches!(credit, Credit::NewlyCounted { .. }).then(|| st.clone());
            (credit, advancement, st.active_index, snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.persist(&snapshot);
        }

        let outcome = match credit {
            Credit::NewlyCounted { join_count } => {
                info!(user = %user, channel = %channel, join_count, "user counted");
                self.publish(GateEvent::Counted {
                    channel: channel.get(),
                    user_id: user,
                    join_count,
                });
                if let Some(adv) = advancement {
                    info!(
                        completed = adv.completed,
                        active_index = adv.active_index,
                        "rotation advanced"
                    );
                    self.publish(GateEvent::Advanced(adv));
                }
                VerifyOutcome::NewlyCounted { advancement }
            }
            Credit::AlreadyCounted => VerifyOutcome::AlreadyCounted,
            Credit::NotPending => {
                debug!(user = %user, channel = %channel, "member verified without prompt; not credited");
                VerifyOutcome::Uncredited
            }
        };

        VerifyReport {
            channel,
            outcome,
            active_index,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Oracle lookup; any failure is treated as "not a member".
    async fn check_membership(&self, channel: ChannelIndex, user: UserId) -> MembershipStatus {
        let chat_id = self.roster.get(channel).chat_id;
        match self.oracle.check_status(chat_id, user).await {
            Ok(status) => status,
            Err(e) => {
                let err = GateError::OracleUnavailable(e);
                warn!(user = %user, channel = %channel, chat_id, error = %err, "membership check failed; treating as non-member");
                MembershipStatus::Unknown
            }
        }
    }

    /// Write-through save. A failure is logged and counted; the in-memory
    /// state stays authoritative.
    fn persist(&self, state: &GlobalState) {
        if let Err(e) = self.store.save(state) {
            self.persistence_failures.fetch_add(1, Ordering::Relaxed);
            let err = GateError::PersistenceFailure(e);
            warn!(store = %self.store.describe(), error = %err, "state save failed; continuing from memory");
        }
    }

    fn publish(&self, event: GateEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
