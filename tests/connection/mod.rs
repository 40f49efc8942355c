//! Test organization:
//! - events.rs: event order and repeated-failure suppression
//! - accessors.rs: `connected` and `current_connection`
//! - shutdown.rs: `close`, `close_finished`, and in-flight attempts
//! - pacing.rs: retry delay between attempts and between cycles
//! - service.rs: Tower services as connectors

mod accessors;
mod events;
mod service;
mod support;
