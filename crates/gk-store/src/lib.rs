//! gk-store
//!
//! Durable snapshot of the gate state.
//!
//! The store is a snapshot, never a synchronization mechanism: the gate
//! serializes mutations in memory and writes the whole value through after
//! each one. A missing or unreadable snapshot is not fatal; [`recover`]
//! falls back to a fresh state and says why.

mod file;

use std::fmt;

use gk_schemas::{GlobalState, PersistedState, RepairReport};
use tracing::{info, warn};

pub use file::JsonFileStateStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Filesystem (or backing service) failure.
    Io(String),
    /// Stored bytes are not a decodable state record.
    Malformed(String),
    /// The state could not be encoded.
    Encode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "state store io error: {msg}"),
            StoreError::Malformed(msg) => write!(f, "stored state is malformed: {msg}"),
            StoreError::Encode(msg) => write!(f, "state encode error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Whole-value state persistence.
///
/// `load` returns `Ok(None)` when nothing was ever saved. `save` replaces the
/// stored value atomically or not at all.
pub trait StateStore: Send + Sync {
    /// Human-readable location for logs (e.g. a file path).
    fn describe(&self) -> String;

    fn load(&self) -> Result<Option<PersistedState>, StoreError>;

    fn save(&self, state: &GlobalState) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Boot-time recovery
// ---------------------------------------------------------------------------

/// Where the boot state came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOrigin {
    /// Nothing stored yet.
    Fresh,
    /// Stored record loaded; `report` lists what the repair step changed.
    Restored { report: RepairReport },
    /// Stored record unusable; started over.
    Reset { reason: StoreError },
}

#[derive(Debug, Clone)]
pub struct Recovery {
    pub state: GlobalState,
    pub origin: RecoveryOrigin,
}

/// Load and repair the stored state for `channel_count` channels.
///
/// Never fails: read errors and malformed records are logged and replaced by
/// [`GlobalState::fresh`].
pub fn recover(store: &dyn StateStore, channel_count: usize) -> Recovery {
    match store.load() {
        Ok(None) => {
            info!(store = %store.describe(), channel_count, "no stored state; starting fresh");
            Recovery {
                state: GlobalState::fresh(channel_count),
                origin: RecoveryOrigin::Fresh,
            }
        }
        Ok(Some(persisted)) => {
            let (state, report) = persisted.repair(channel_count);
            if report.is_clean() {
                info!(
                    store = %store.describe(),
                    active_index = state.active_index,
                    "restored stored state"
                );
            } else {
                warn!(
                    store = %store.describe(),
                    active_index = state.active_index,
                    ?report,
                    "restored stored state with repairs"
                );
            }
            Recovery {
                state,
                origin: RecoveryOrigin::Restored { report },
            }
        }
        Err(reason) => {
            warn!(
                store = %store.describe(),
                error = %reason,
                "stored state unusable; starting fresh"
            );
            Recovery {
                state: GlobalState::fresh(channel_count),
                origin: RecoveryOrigin::Reset { reason },
            }
        }
    }
}
