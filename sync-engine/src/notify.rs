//! Remote change notifications.
//!
//! A transport that can tell us "this path changed on that remote"
//! plugs in here; the service turns each notification into a targeted
//! pull, skipping it when the advertised hash already matches local
//! state. Deployments without a notification channel simply rely on the
//! periodic sweep.

use tokio::sync::broadcast;

use sync_types::{ItemHash, RemoteId, SyncablePath};

/// One "something changed" signal from a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// The remote reporting the change.
    pub remote_id: RemoteId,
    /// The changed path.
    pub path: SyncablePath,
    /// The remote's hash of the path after the change.
    pub hash: ItemHash,
}

/// A source of remote [`ContentChange`] signals.
pub trait ChangeNotifications: Send + Sync {
    /// Subscribe to change signals. Lagging subscribers lose the oldest
    /// signals, which is safe: a lost signal is recovered by the sweep.
    fn subscribe(&self) -> broadcast::Receiver<ContentChange>;
}

/// An in-process [`ChangeNotifications`] source, fed by hand.
///
/// The test double, and the natural adapter for any push transport that
/// delivers change callbacks.
pub struct MockNotifier {
    sender: broadcast::Sender<ContentChange>,
}

impl MockNotifier {
    /// Create a notifier with a small replay buffer.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Deliver one change signal to all subscribers.
    pub fn notify(&self, change: ContentChange) {
        // No subscribers is fine; the signal is simply dropped.
        let _ = self.sender.send(change);
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifications for MockNotifier {
    fn subscribe(&self) -> broadcast::Receiver<ContentChange> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::{StorageRootId, SyncableId};

    #[tokio::test]
    async fn subscribers_receive_changes() {
        let notifier = MockNotifier::new();
        let mut rx = notifier.subscribe();

        let change = ContentChange {
            remote_id: RemoteId::new("peer"),
            path: SyncablePath::root(StorageRootId::new("mail"))
                .child(SyncableId::folder("inbox")),
            hash: ItemHash::of_content(b"x"),
        };
        notifier.notify(change.clone());
        assert_eq!(rx.recv().await.unwrap(), change);
    }

    #[test]
    fn notify_without_subscribers_is_fine() {
        let notifier = MockNotifier::new();
        notifier.notify(ContentChange {
            remote_id: RemoteId::new("peer"),
            path: SyncablePath::root(StorageRootId::new("mail")),
            hash: ItemHash::of_content(b"x"),
        });
    }
}
