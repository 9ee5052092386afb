//! In-process lock store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use sync_types::SyncError;

use super::{LockStore, LockToken};

/// One queued acquirer. The lock is handed over by setting `holder` to
/// the waiter's id before signalling, so there is never an instant with
/// two holders.
struct Waiter {
    id: Uuid,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct KeyState {
    holder: Option<Uuid>,
    waiters: VecDeque<Waiter>,
}

#[derive(Default)]
struct Inner {
    keys: Mutex<HashMap<String, KeyState>>,
}

impl Inner {
    /// Release `key` if `id` still holds it, promoting the next live
    /// waiter FIFO. Stale ids are a no-op.
    fn release(&self, key: &str, id: Uuid) {
        let mut keys = self.keys.lock().expect("lock table poisoned");
        let Some(state) = keys.get_mut(key) else {
            return;
        };
        if state.holder != Some(id) {
            return;
        }
        state.holder = None;
        while let Some(waiter) = state.waiters.pop_front() {
            let waiter_id = waiter.id;
            state.holder = Some(waiter_id);
            if waiter.tx.send(()).is_ok() {
                return;
            }
            // Waiter timed out between enqueue and handoff; try the next.
            state.holder = None;
        }
        if state.waiters.is_empty() {
            keys.remove(key);
        }
    }
}

/// Waiter-list [`LockStore`] for a single process.
///
/// Cheap and exact: FIFO handoff under one table mutex, lease enforced by
/// a spawned timer per acquisition.
#[derive(Clone, Default)]
pub struct InProcessLockStore {
    inner: Arc<Inner>,
}

impl InProcessLockStore {
    /// Create an empty lock store.
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule_lease(&self, key: &str, id: Uuid, lease: Duration) {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(lease).await;
            inner.release(&key, id);
        });
    }
}

#[async_trait]
impl LockStore for InProcessLockStore {
    async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
        lease: Duration,
    ) -> Result<LockToken, SyncError> {
        let token = LockToken::new(key);
        let rx = {
            let mut keys = self.inner.keys.lock().expect("lock table poisoned");
            let state = keys.entry(key.to_string()).or_default();
            if state.holder.is_none() && state.waiters.is_empty() {
                state.holder = Some(token.id());
                None
            } else {
                if timeout.is_zero() {
                    return Err(SyncError::LockTimeout(key.to_string()));
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(Waiter {
                    id: token.id(),
                    tx,
                });
                Some(rx)
            }
        };

        if let Some(rx) = rx {
            match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    return Err(SyncError::Internal(format!(
                        "lock store dropped waiter for {key}"
                    )))
                }
                Err(_) => {
                    // Either remove ourselves from the queue, or - if the
                    // handoff raced the deadline - give the lock straight
                    // back.
                    let raced = {
                        let mut keys = self.inner.keys.lock().expect("lock table poisoned");
                        match keys.get_mut(key) {
                            Some(state) if state.holder == Some(token.id()) => true,
                            Some(state) => {
                                state.waiters.retain(|w| w.id != token.id());
                                false
                            }
                            None => false,
                        }
                    };
                    if raced {
                        self.inner.release(key, token.id());
                    }
                    return Err(SyncError::LockTimeout(key.to_string()));
                }
            }
        }

        self.schedule_lease(key, token.id(), lease);
        Ok(token)
    }

    async fn release(&self, token: LockToken) -> Result<(), SyncError> {
        self.inner.release(token.key(), token.id());
        Ok(())
    }
}
