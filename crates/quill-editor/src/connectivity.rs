//! Connectivity monitor.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared online/offline flag with change notification.
///
/// Cloning is cheap; clones observe the same flag. The embedding
/// application (or a probe task) calls [`ConnectivityMonitor::set_online`].
#[derive(Clone, Debug)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the flag. Subscribers are notified only on an actual change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "Connectivity changed");
        }
    }

    /// Subscribe to offline→online transitions.
    #[must_use]
    pub fn subscribe(&self) -> OnlineEdges {
        OnlineEdges {
            rx: self.tx.subscribe(),
        }
    }
}

/// Edge-triggered "became online" notifications.
#[derive(Debug)]
pub struct OnlineEdges {
    rx: watch::Receiver<bool>,
}

impl OnlineEdges {
    /// Wait for the next transition to online.
    ///
    /// Returns `false` if the monitor was dropped.
    pub async fn became_online(&mut self) -> bool {
        loop {
            if self.rx.changed().await.is_err() {
                return false;
            }
            if *self.rx.borrow_and_update() {
                return true;
            }
        }
    }
}
