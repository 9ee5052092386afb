//! Lock store delegating to an external coordinator.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use sync_types::SyncError;

use super::{LockStore, LockToken};

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// A remote coordination service that can grant and revoke keyed leases.
///
/// Implementations wrap whatever the deployment offers - a relay
/// endpoint, a database row, a cloud conditional-put. The contract is
/// try-acquire semantics: one round-trip, no blocking on the far side.
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// Attempt to take `key` with the given lease. Returns `false` when
    /// the key is currently granted to someone else.
    async fn try_acquire(&self, key: &str, id: Uuid, lease: Duration) -> Result<bool, SyncError>;

    /// Return `key` if `id` still holds it. Idempotent.
    async fn release(&self, key: &str, id: Uuid) -> Result<(), SyncError>;
}

/// A [`LockStore`] that polls an external [`LockCoordinator`].
///
/// The coordinator owns lease expiry (it granted the lease, it reclaims
/// it), so unlike the in-process store no local timer is needed.
pub struct CoordinatedLockStore<C: LockCoordinator> {
    coordinator: C,
    retry_interval: Duration,
}

impl<C: LockCoordinator> CoordinatedLockStore<C> {
    /// Wrap a coordinator.
    pub fn new(coordinator: C) -> Self {
        Self {
            coordinator,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Override the retry interval (mainly for tests).
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

#[async_trait]
impl<C: LockCoordinator> LockStore for CoordinatedLockStore<C> {
    async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
        lease: Duration,
    ) -> Result<LockToken, SyncError> {
        let token = LockToken::new(key);
        let deadline = Instant::now() + timeout;
        loop {
            if self.coordinator.try_acquire(key, token.id(), lease).await? {
                return Ok(token);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SyncError::LockTimeout(key.to_string()));
            }
            tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
        }
    }

    async fn release(&self, token: LockToken) -> Result<(), SyncError> {
        self.coordinator.release(token.key(), token.id()).await
    }
}
