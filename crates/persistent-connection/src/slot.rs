//! Single-assignment connection slots and the replaceable reference to the
//! current one.

use std::sync::Arc;
use tokio::sync::watch;

/// Terminal value of a slot generation.
#[derive(Debug, Clone)]
pub(crate) enum Outcome<C> {
    Ready(C),
    ShuttingDown,
}

/// One generation: starts unresolved and is resolved exactly once.
#[derive(Debug)]
pub(crate) struct Slot<C> {
    value: watch::Sender<Option<Outcome<C>>>,
}

impl<C: Clone> Slot<C> {
    pub(crate) fn new() -> Self {
        let (value, _) = watch::channel(None);
        Self { value }
    }

    /// Assigns the terminal value. Returns `false` and leaves the slot
    /// untouched if it was already resolved.
    pub(crate) fn resolve(&self, outcome: Outcome<C>) -> bool {
        self.value.send_if_modified(|value| {
            if value.is_some() {
                return false;
            }
            *value = Some(outcome);
            true
        })
    }

    pub(crate) fn peek(&self) -> Option<Outcome<C>> {
        self.value.borrow().clone()
    }

    /// Waits for the terminal value, without suspending if it is already set.
    pub(crate) async fn resolved(&self) -> Outcome<C> {
        if let Some(outcome) = self.peek() {
            return outcome;
        }
        let mut rx = self.value.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` owns the sender.
                return std::future::pending().await;
            }
        }
    }
}

/// The reference to the current generation.
///
/// Only the engine calls [`advance`](Self::advance); everyone else takes a
/// snapshot with [`current`](Self::current) before waiting so a replacement
/// cannot be missed.
#[derive(Debug)]
pub(crate) struct Generations<C> {
    current: watch::Sender<Arc<Slot<C>>>,
}

impl<C: Clone> Generations<C> {
    pub(crate) fn new() -> Self {
        let (current, _) = watch::channel(Arc::new(Slot::new()));
        Self { current }
    }

    pub(crate) fn current(&self) -> Arc<Slot<C>> {
        Arc::clone(&self.current.borrow())
    }

    /// Retires the current generation and installs a fresh unresolved one.
    pub(crate) fn advance(&self) -> Arc<Slot<C>> {
        let fresh = Arc::new(Slot::new());
        self.current.send_replace(Arc::clone(&fresh));
        fresh
    }

    /// Completes once `slot` is no longer the current generation.
    pub(crate) async fn superseded(&self, slot: &Arc<Slot<C>>) {
        let mut rx = self.current.subscribe();
        let _ = rx.wait_for(|current| !Arc::ptr_eq(current, slot)).await;
    }
}
