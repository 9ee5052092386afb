//! Keyed mutual exclusion with lease auto-release.
//!
//! A lock is addressed by a string key. `acquire` blocks cooperatively
//! (FIFO) until the key is free or the caller's timeout elapses; once
//! held, an automatic release fires after the lease regardless of
//! explicit release, so a crashed or leaked holder can never wedge a key
//! forever. Tokens are single-use and releasing with a stale token is a
//! no-op, never an error.
//!
//! Three interchangeable implementations satisfy [`LockStore`]:
//! - [`InProcessLockStore`] - waiter-list lock for a single process
//! - [`FileLockStore`] - exclusive-create-as-mutex with polling retry
//! - [`CoordinatedLockStore`] - adapter over an external coordinator
//!
//! The reconciliation engine is agnostic to which one is in use.

mod coordinated;
mod file;
mod memory;

pub use coordinated::{CoordinatedLockStore, LockCoordinator};
pub use file::FileLockStore;
pub use memory::InProcessLockStore;

use async_trait::async_trait;
use dashmap::DashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use sync_types::SyncError;

/// Proof of holding one lock. Single-use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    id: Uuid,
}

impl LockToken {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            id: Uuid::new_v4(),
        }
    }

    /// The key this token was acquired for.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }
}

/// Keyed mutual exclusion with a lease.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Acquire the lock for `key`.
    ///
    /// Blocks cooperatively until the key is free or `timeout` elapses
    /// ([`SyncError::LockTimeout`]). A zero timeout while the key is held
    /// fails immediately. Waiters are served FIFO. The lock auto-releases
    /// after `lease` even without an explicit [`release`](Self::release).
    async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
        lease: Duration,
    ) -> Result<LockToken, SyncError>;

    /// Release a held lock. Idempotent: a stale or already-expired token
    /// is a no-op.
    async fn release(&self, token: LockToken) -> Result<(), SyncError>;
}

/// The set of lock keys the current logical operation chain already
/// holds.
///
/// Threaded explicitly through call parameters (never ambient state) so
/// a causal chain that re-enters a lock it already holds runs the nested
/// section directly instead of deadlocking on itself. Cloning shares the
/// underlying set: every frame of one chain sees the same held keys.
#[derive(Debug, Clone, Default)]
pub struct HeldLocks {
    keys: Arc<DashSet<String>>,
}

impl HeldLocks {
    /// An empty context for the start of a new operation chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the chain already holds `key`.
    pub fn holds(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn insert(&self, key: &str) {
        self.keys.insert(key.to_string());
    }

    fn remove(&self, key: &str) {
        self.keys.remove(key);
    }
}

/// Run `work` while holding the lock for `key`.
///
/// If the chain's [`HeldLocks`] already contains `key`, the nested
/// acquire is skipped and `work` runs directly. Otherwise the lock is
/// acquired, recorded in the context for the duration of `work`, and
/// released afterwards whether `work` succeeded or not. A panic inside
/// `work` leaks the explicit release; the lease then frees the key.
pub async fn with_lock<S, F, Fut, T>(
    held: &HeldLocks,
    store: &S,
    key: &str,
    timeout: Duration,
    lease: Duration,
    work: F,
) -> Result<T, SyncError>
where
    S: LockStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    if held.holds(key) {
        return work().await;
    }

    let token = store.acquire(key, timeout, lease).await?;
    held.insert(key);
    let result = work().await;
    held.remove(key);
    store.release(token).await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reentrant_with_lock_skips_nested_acquire() {
        let store = InProcessLockStore::new();
        let held = HeldLocks::new();

        // The nested closure re-acquires the same key; without the held
        // set this would deadlock on the zero-wait inner acquire.
        let result = with_lock(
            &held,
            &store,
            "key",
            Duration::from_millis(100),
            Duration::from_secs(5),
            || async {
                with_lock(
                    &held,
                    &store,
                    "key",
                    Duration::ZERO,
                    Duration::from_secs(5),
                    || async { Ok(42) },
                )
                .await
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert!(!held.holds("key"));
    }

    #[tokio::test]
    async fn with_lock_releases_on_error() {
        let store = InProcessLockStore::new();
        let held = HeldLocks::new();

        let result: Result<(), _> = with_lock(
            &held,
            &store,
            "key",
            Duration::from_millis(100),
            Duration::from_secs(5),
            || async { Err(SyncError::Conflict("boom".into())) },
        )
        .await;
        assert!(result.is_err());
        assert!(!held.holds("key"));

        // The key must be free again.
        let token = store
            .acquire("key", Duration::ZERO, Duration::from_secs(5))
            .await
            .unwrap();
        store.release(token).await.unwrap();
    }

    #[tokio::test]
    async fn distinct_chains_do_not_share_held_keys() {
        let a = HeldLocks::new();
        let b = HeldLocks::new();
        a.insert("key");
        assert!(a.holds("key"));
        assert!(!b.holds("key"));
    }
}
