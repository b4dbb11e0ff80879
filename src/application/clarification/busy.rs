//! Shared "LLM busy" flag.
//!
//! One flag is shared by every component that talks to the text generator.
//! Acquisition is compare-and-set; the returned guard clears the flag when
//! dropped, on every exit path including panics and task abort.

use std::sync::Arc;
use tokio::sync::watch;

/// Observable busy flag, cloned into each consumer.
#[derive(Debug, Clone)]
pub struct LlmBusyFlag {
    tx: Arc<watch::Sender<bool>>,
}

/// Holds the busy flag until dropped.
#[derive(Debug)]
#[must_use = "the busy flag is released as soon as the guard is dropped"]
pub struct BusyGuard {
    tx: Arc<watch::Sender<bool>>,
}

impl LlmBusyFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_busy(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Sets the flag if it is clear. Returns `None` if someone else holds it.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        let acquired = self.tx.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        acquired.then(|| BusyGuard {
            tx: Arc::clone(&self.tx),
        })
    }
}

impl Default for LlmBusyFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tx.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive() {
        let flag = LlmBusyFlag::new();
        let guard = flag.try_acquire().expect("first acquire succeeds");
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn clones_share_state() {
        let flag = LlmBusyFlag::new();
        let other = flag.clone();
        let _guard = flag.try_acquire().unwrap();
        assert!(other.is_busy());
        assert!(other.try_acquire().is_none());
    }

    #[tokio::test]
    async fn guard_released_when_task_aborted() {
        let flag = LlmBusyFlag::new();
        let guard = flag.try_acquire().unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        handle.abort();
        let _ = handle.await;
        assert!(!flag.is_busy());
    }

    #[tokio::test]
    async fn subscribers_see_release() {
        let flag = LlmBusyFlag::new();
        let mut rx = flag.subscribe();
        let guard = flag.try_acquire().unwrap();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        drop(guard);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }
}
