use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use gk_schemas::{GlobalState, PersistedState};
use gk_store::{StateStore, StoreError};

/// In-memory state store.
///
/// `load` returns the last saved state as it would read back from disk (a
/// JSON round trip through [`PersistedState`]), or a seeded record.
pub struct MemoryStateStore {
    saved: Mutex<Option<GlobalState>>,
    seeded: Mutex<Option<Result<PersistedState, StoreError>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            saved: Mutex::new(None),
            seeded: Mutex::new(None),
            fail_saves: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    /// Store whose first `load` yields `record`.
    pub fn seeded(record: PersistedState) -> Self {
        let s = Self::new();
        *lock(&s.seeded) = Some(Ok(record));
        s
    }

    /// Store whose first `load` fails with `err`.
    pub fn unreadable(err: StoreError) -> Self {
        let s = Self::new();
        *lock(&s.seeded) = Some(Err(err));
        s
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last_saved(&self) -> Option<GlobalState> {
        lock(&self.saved).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StateStore for MemoryStateStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        if let Some(seed) = lock(&self.seeded).take() {
            return seed.map(Some);
        }
        let Some(state) = lock(&self.saved).clone() else {
            return Ok(None);
        };
        let value = serde_json::to_value(&state).map_err(|e| StoreError::Encode(e.to_string()))?;
        let persisted =
            serde_json::from_value(value).map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(Some(persisted))
    }

    fn save(&self, state: &GlobalState) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io("injected save failure".to_string()));
        }
        *lock(&self.saved) = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
