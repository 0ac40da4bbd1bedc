use std::fmt;

use gk_oracle::OracleError;
use gk_store::StoreError;

/// Gate error taxonomy.
///
/// Only `InvalidChannel` and `MalformedRequest` are ever returned to a caller.
/// `OracleUnavailable` is absorbed as non-membership (fail-closed) and
/// `PersistenceFailure` is absorbed with the in-memory answer standing; both
/// exist so those events are logged under a stable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    OracleUnavailable(OracleError),
    PersistenceFailure(StoreError),
    InvalidChannel { index: i64, channel_count: usize },
    MalformedRequest(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::OracleUnavailable(e) => write!(f, "ORACLE_UNAVAILABLE: {e}"),
            GateError::PersistenceFailure(e) => write!(f, "PERSISTENCE_FAILURE: {e}"),
            GateError::InvalidChannel {
                index,
                channel_count,
            } => write!(
                f,
                "INVALID_CHANNEL: index {index} outside 0..{channel_count}"
            ),
            GateError::MalformedRequest(msg) => write!(f, "MALFORMED_REQUEST: {msg}"),
        }
    }
}

impl std::error::Error for GateError {}
