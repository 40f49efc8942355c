//! A single long-lived connection that survives outages.
//!
//! [`PersistentConnection`] resolves a server's address, connects, notices
//! when the connection closes, and starts over, forever, until it is shut
//! down. Callers always see "the current good connection, if any":
//!
//! - [`connected`](PersistentConnection::connected) waits for a live connection
//!   and never hands out one that is already closed.
//! - [`current_connection`](PersistentConnection::current_connection) peeks
//!   without waiting.
//! - [`close`](PersistentConnection::close) is idempotent and closes the live
//!   connection exactly once, even while a connect attempt is in flight.
//!
//! # Features
//!
//! - **Jittered pacing**: attempts are spaced by a [`RetryDelay`] (10s ±30% by
//!   default). The delay also bounds how often whole cycles may start, so a
//!   connection that lived long reconnects at once when it drops while a
//!   connection that dies immediately is still rate-limited.
//! - **Quiet failure reporting**: consecutive failures with the same
//!   underlying cause produce one `FailedToConnect` event per cycle.
//! - **Event system**: [`ConnectionEvent`]s go to user callbacks and, with the
//!   `tracing` feature, to the log tagged `persistent_connection_to`.
//! - **Pluggable collaborators**: any closure or [`Resolve`]/[`Connect`]
//!   implementation, any Tower service via [`ServiceConnector`], or the
//!   bundled framed TCP transport via [`PersistentConnection::tcp`].
//!
//! # Examples
//!
//! ```
//! use persistent_connection::{BoxError, ConnectionConfig, PersistentConnection, RetryDelay};
//! use std::time::Duration;
//! # use futures::future::BoxFuture;
//! # use std::sync::Arc;
//! # #[derive(Clone, Default)]
//! # struct Session(Arc<persistent_connection_core::Signal>);
//! # impl persistent_connection::Connection for Session {
//! #     fn close(&self) -> BoxFuture<'_, ()> { self.0.fire(); Box::pin(async {}) }
//! #     fn closed(&self) -> BoxFuture<'_, ()> { Box::pin(self.0.fired()) }
//! #     fn is_closed(&self) -> bool { self.0.is_fired() }
//! # }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = ConnectionConfig::<String>::builder("inventory")
//!     .retry_delay(RetryDelay::new(Duration::from_millis(200)))
//!     .on_event(|event| println!("{event:?}"))
//!     .build();
//!
//! let conn = PersistentConnection::create(
//!     config,
//!     || async { Ok::<_, BoxError>("inventory.internal:9000".to_string()) },
//!     |_address: String| async { Ok::<_, BoxError>(Session::default()) },
//! );
//!
//! let _session = conn.connected().await;
//! conn.close().await;
//! # }
//! ```

mod attempt;
mod backoff;
mod config;
mod connector;
mod engine;
mod error;
mod events;
mod slot;
mod state;
mod tcp;

pub use backoff::RetryDelay;
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connector::{Address, Connect, Connection, Resolve, ServiceConnector, StaticAddress};
pub use engine::PersistentConnection;
pub use error::{BoxError, ConnectError};
pub use events::ConnectionEvent;
pub use state::ConnectionState;
pub use tcp::{Heartbeat, TcpConnection, TcpConnector, TcpOptions, TransportError, TransportFn};

pub use persistent_connection_core::{LifecycleEvent, Severity};
