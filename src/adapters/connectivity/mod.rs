//! Connectivity Adapters
//!
//! - `WatchConnectivity` - `tokio::sync::watch` backed reachability signal

mod watch_connectivity;

pub use watch_connectivity::WatchConnectivity;
