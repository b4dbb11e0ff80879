//! Connectivity Port - Observable reachability of the generation service.

use tokio::sync::watch;

/// Port for observing whether the text generator can be reached.
///
/// Passed explicitly to every consumer; there is no process-wide signal.
pub trait ConnectivityMonitor: Send + Sync {
    /// Current reachability.
    fn is_reachable(&self) -> bool;

    /// Receiver notified on every reachability change.
    fn subscribe(&self) -> watch::Receiver<bool>;
}
