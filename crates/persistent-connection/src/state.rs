//! Coarse connection state for monitoring.

use std::fmt;

/// Where a [`PersistentConnection`](crate::PersistentConnection) currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No live connection; an attempt or backoff is in progress.
    Connecting,

    /// A live connection is published.
    Connected,

    /// Shutdown was requested and has not finished.
    ShuttingDown,

    /// Shutdown finished; no further connections will be made.
    Closed,
}

impl ConnectionState {
    /// True for [`ShuttingDown`](Self::ShuttingDown) and [`Closed`](Self::Closed).
    pub fn is_terminating(self) -> bool {
        matches!(self, ConnectionState::ShuttingDown | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ShuttingDown => "shutting down",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
