use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gk_oracle::{MembershipOracle, MembershipStatus, OracleError};
use gk_schemas::UserId;

/// Membership oracle answering from a table.
///
/// Unscripted (chat, user) pairs answer `Left`. A global failure switch makes
/// every call return an error until cleared.
pub struct ScriptedOracle {
    answers: Mutex<HashMap<(i64, UserId), Result<MembershipStatus, OracleError>>>,
    outage: Mutex<Option<OracleError>>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            outage: Mutex::new(None),
            latency: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, chat_id: i64, user: UserId, status: MembershipStatus) {
        self.lock_answers().insert((chat_id, user), Ok(status));
    }

    pub fn set_member(&self, chat_id: i64, user: UserId) {
        self.set_status(chat_id, user, MembershipStatus::Member);
    }

    /// Fail lookups for one (chat, user) pair.
    pub fn set_error(&self, chat_id: i64, user: UserId, err: OracleError) {
        self.lock_answers().insert((chat_id, user), Err(err));
    }

    /// Fail every lookup until [`ScriptedOracle::end_outage`].
    pub fn begin_outage(&self, err: OracleError) {
        *lock(&self.outage) = Some(err);
    }

    pub fn end_outage(&self) {
        *lock(&self.outage) = None;
    }

    /// Delay every answer, to widen race windows.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_answers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(i64, UserId), Result<MembershipStatus, OracleError>>>
    {
        lock(&self.answers)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl MembershipOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn check_status(
        &self,
        chat_id: i64,
        user: UserId,
    ) -> Result<MembershipStatus, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *lock(&self.latency);
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
        if let Some(err) = lock(&self.outage).clone() {
            return Err(err);
        }
        lock(&self.answers)
            .get(&(chat_id, user))
            .cloned()
            .unwrap_or(Ok(MembershipStatus::Left))
    }
}
