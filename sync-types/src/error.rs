//! Error taxonomy for Canopy sync operations.

use thiserror::Error;

/// Errors that can occur during sync operations.
///
/// `NotFound` is frequently benign: during a first sync an item usually
/// does not exist on most replicas yet. Multi-remote fan-out therefore
/// swallows it unless every remote reports it.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The addressed item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The path addressed an item of the wrong kind.
    #[error("wrong item type at {path}: expected {expected}")]
    WrongType {
        /// Canonical form of the offending path.
        path: String,
        /// The kind the caller expected to find.
        expected: String,
    },

    /// A lock could not be acquired within the caller's timeout.
    #[error("lock timeout on key {0}")]
    LockTimeout(String),

    /// A state transition precondition no longer holds.
    #[error("conflict: {0}")]
    Conflict(String),

    /// MessagePack serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// An I/O fault from a storage backing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether this error is the benign "item absent" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::LockTimeout("root/d:inbox".into());
        assert_eq!(err.to_string(), "lock timeout on key root/d:inbox");
    }

    #[test]
    fn not_found_predicate() {
        assert!(SyncError::NotFound("x".into()).is_not_found());
        assert!(!SyncError::Conflict("x".into()).is_not_found());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
