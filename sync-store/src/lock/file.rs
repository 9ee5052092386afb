//! File-based lock store.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use uuid::Uuid;

use sync_types::SyncError;

use super::{LockStore, LockToken};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A [`LockStore`] using exclusive file creation as the mutex.
///
/// Works across processes sharing a directory (e.g. several instances of
/// an app over one origin-scoped filesystem). The lock file holds the
/// token id plus a lease deadline; an acquirer that finds an expired file
/// takes the lock over, so a crashed holder never wedges a key. Waiting
/// is a polling retry, not FIFO - fairness across processes is best
/// effort.
pub struct FileLockStore {
    dir: PathBuf,
    poll_interval: Duration,
}

impl FileLockStore {
    /// Create a lock store over `dir`. The directory must exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the retry interval (mainly for tests).
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        // Hex keeps arbitrary keys (paths with separators) filename-safe.
        self.dir.join(format!("{}.lock", hex::encode(key.as_bytes())))
    }

    async fn try_create(&self, path: &Path, contents: &str) -> Result<bool, SyncError> {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => {
                use tokio::io::AsyncWriteExt;
                let mut file = file;
                file.write_all(contents.as_bytes()).await?;
                file.sync_all().await?;
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove the lock file only if it still carries `expected`.
    ///
    /// Read-compare-remove is not atomic across processes; the lease
    /// deadline bounds the damage of the remaining window.
    async fn remove_if_matches(&self, path: &Path, expected: &str) -> Result<(), SyncError> {
        match tokio::fs::read_to_string(path).await {
            Ok(current) if current == expected => match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            },
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn schedule_lease(&self, path: PathBuf, contents: String, lease: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(lease).await;
            match tokio::fs::read_to_string(&path).await {
                Ok(current) if current == contents => {
                    if let Err(err) = tokio::fs::remove_file(&path).await {
                        if err.kind() != ErrorKind::NotFound {
                            tracing::warn!(path = %path.display(), %err, "lease release failed");
                        }
                    }
                }
                _ => {}
            }
        });
    }
}

fn unix_millis(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

fn file_contents(id: Uuid, lease: Duration) -> String {
    format!("{}\n{}", id, unix_millis(SystemTime::now() + lease))
}

fn is_expired(contents: &str) -> bool {
    let Some(deadline) = contents.lines().nth(1).and_then(|l| l.parse::<u128>().ok()) else {
        // Unparseable lock files count as stale.
        return true;
    };
    unix_millis(SystemTime::now()) > deadline
}

#[async_trait]
impl LockStore for FileLockStore {
    async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
        lease: Duration,
    ) -> Result<LockToken, SyncError> {
        let token = LockToken::new(key);
        let path = self.lock_path(key);
        let deadline = Instant::now() + timeout;

        loop {
            let contents = file_contents(token.id(), lease);
            if self.try_create(&path, &contents).await? {
                self.schedule_lease(path.clone(), contents, lease);
                return Ok(token);
            }

            // Held by someone: take over if their lease expired.
            match tokio::fs::read_to_string(&path).await {
                Ok(current) if is_expired(&current) => {
                    self.remove_if_matches(&path, &current).await?;
                    continue;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
                Ok(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SyncError::LockTimeout(key.to_string()));
            }
            let wait = self.poll_interval.min(deadline - now);
            tokio::time::sleep(wait).await;
        }
    }

    async fn release(&self, token: LockToken) -> Result<(), SyncError> {
        let path = self.lock_path(token.key());
        match tokio::fs::read_to_string(&path).await {
            Ok(current)
                if current
                    .lines()
                    .next()
                    .map(|line| line == token.id().to_string())
                    .unwrap_or(false) =>
            {
                self.remove_if_matches(&path, &current).await
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
            Ok(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(5);

    fn store(dir: &tempfile::TempDir) -> FileLockStore {
        FileLockStore::new(dir.path()).with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn acquire_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let token = store.acquire("key", Duration::ZERO, LEASE).await.unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().count() == 1);

        store.release(token).await.unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().count() == 0);
    }

    #[tokio::test]
    async fn zero_timeout_on_held_lock_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let _held = store.acquire("key", Duration::ZERO, LEASE).await.unwrap();

        let err = store.acquire("key", Duration::ZERO, LEASE).await.unwrap_err();
        assert!(matches!(err, SyncError::LockTimeout(_)));
    }

    #[tokio::test]
    async fn waiting_acquire_succeeds_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store(&dir));
        let held = store.acquire("key", Duration::ZERO, LEASE).await.unwrap();

        let waiter = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move {
                store.acquire("key", Duration::from_secs(2), LEASE).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.release(held).await.unwrap();

        let token = waiter.await.unwrap().unwrap();
        store.release(token).await.unwrap();
    }

    #[tokio::test]
    async fn expired_lease_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        // Short lease, never released.
        let _leaked = store
            .acquire("key", Duration::ZERO, Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let token = store.acquire("key", Duration::ZERO, LEASE).await.unwrap();
        store.release(token).await.unwrap();
    }

    #[tokio::test]
    async fn stale_release_leaves_new_holder_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let first = store
            .acquire("key", Duration::ZERO, Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let second = store.acquire("key", Duration::ZERO, LEASE).await.unwrap();

        store.release(first).await.unwrap();
        let err = store.acquire("key", Duration::ZERO, LEASE).await.unwrap_err();
        assert!(matches!(err, SyncError::LockTimeout(_)));

        store.release(second).await.unwrap();
    }

    #[tokio::test]
    async fn keys_map_to_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let _a = store.acquire("mail/d:inbox", Duration::ZERO, LEASE).await.unwrap();
        let _b = store.acquire("mail/d:sent", Duration::ZERO, LEASE).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
