//! Core infrastructure for persistent-connection.
//!
//! This crate provides the pieces the reconnection engine is built on that are
//! independent of any particular connection type:
//! - Lifecycle event trait, severities, and a panic-isolating listener set
//! - [`Signal`], a one-shot broadcast flag awaitable by any number of tasks

pub mod events;
pub mod signal;

pub use events::{EventListener, FnListener, LifecycleEvent, Listeners, Severity};
pub use signal::Signal;
