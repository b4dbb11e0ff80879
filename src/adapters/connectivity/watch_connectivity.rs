//! Watch-channel backed connectivity monitor.

use std::sync::Arc;
use tokio::sync::watch;

use crate::ports::ConnectivityMonitor;

/// Reachability signal that any holder can update.
///
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct WatchConnectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl WatchConnectivity {
    pub fn new(reachable: bool) -> Self {
        let (tx, _rx) = watch::channel(reachable);
        Self { tx: Arc::new(tx) }
    }

    /// Publishes a new reachability value; no-op if unchanged.
    pub fn set_reachable(&self, reachable: bool) {
        self.tx.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
    }
}

impl Default for WatchConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor for WatchConnectivity {
    fn is_reachable(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_reachable() {
        assert!(WatchConnectivity::default().is_reachable());
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let monitor = WatchConnectivity::new(true);
        let mut rx = monitor.subscribe();

        monitor.set_reachable(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
        assert!(!monitor.is_reachable());
    }

    #[test]
    fn unchanged_value_does_not_notify() {
        let monitor = WatchConnectivity::new(true);
        let rx = monitor.subscribe();
        monitor.set_reachable(true);
        assert!(!rx.has_changed().unwrap());
    }
}
