//! Lifecycle event infrastructure.
//!
//! Events are delivered synchronously, in emission order, to every registered
//! listener. A listener that panics is isolated: the panic is caught, counted,
//! and the remaining listeners still see the event.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

/// How loudly an event should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Normal lifecycle progress.
    Info,
    /// Something went wrong and will be retried.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// An event published by a long-lived connection.
pub trait LifecycleEvent: Send + Sync + fmt::Debug {
    /// Short, stable name of the event kind (e.g. `"connected"`).
    fn event_type(&self) -> &'static str;

    /// When the event was produced.
    fn timestamp(&self) -> Instant;

    /// Name of the server the emitting connection targets.
    fn server_name(&self) -> &str;

    /// Reporting severity.
    fn severity(&self) -> Severity {
        Severity::Info
    }
}

/// Receives lifecycle events.
pub trait EventListener<E: LifecycleEvent>: Send + Sync {
    /// Called once per event, on the emitting task.
    fn on_event(&self, event: &E);
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<F>(F);

impl<F> FnListener<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: LifecycleEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.0)(event)
    }
}

/// An ordered set of listeners.
pub struct Listeners<E: LifecycleEvent> {
    inner: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: LifecycleEvent> Listeners<E> {
    /// An empty set.
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    /// Appends a listener. Listeners are invoked in registration order.
    pub fn push<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.inner.push(Arc::new(listener));
    }

    /// Appends a closure listener.
    pub fn push_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.push(FnListener::new(f));
    }

    /// Delivers `event` to every listener and returns how many of them panicked.
    pub fn dispatch(&self, event: &E) -> usize {
        self.inner
            .iter()
            .filter(|listener| catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err())
            .count()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<E: LifecycleEvent> Clone for Listeners<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: LifecycleEvent> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LifecycleEvent> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.inner.len())
            .finish()
    }
}
