//! One-shot broadcast signal.

use tokio::sync::watch;

/// A flag that can be raised exactly once and awaited by any number of tasks.
///
/// Waiters that start after the signal fired return immediately. Cloning is
/// not supported; share it behind an `Arc`.
#[derive(Debug)]
pub struct Signal {
    tx: watch::Sender<bool>,
}

impl Signal {
    /// A signal that has not fired.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Raises the signal. Returns `true` only for the call that raised it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether the signal has been raised.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once the signal has been raised.
    pub async fn fired(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
