//! Lifecycle events and their dispatch.

use crate::connector::Address;
use crate::error::ConnectError;
use persistent_connection_core::{LifecycleEvent, Listeners, Severity};
use std::sync::Arc;
use std::time::Instant;

/// Events published by a [`PersistentConnection`](crate::PersistentConnection).
///
/// Within one reconnection cycle they are emitted in the order
/// `AttemptingToConnect`, `ObtainedAddress`, `FailedToConnect`*, `Connected`,
/// `Disconnected`; a cycle ended by shutdown stops after `AttemptingToConnect`.
#[derive(Debug, Clone)]
pub enum ConnectionEvent<A> {
    /// A new reconnection cycle started.
    AttemptingToConnect {
        server_name: Arc<str>,
        timestamp: Instant,
    },
    /// The resolver produced an address not yet reported in this cycle.
    ObtainedAddress {
        server_name: Arc<str>,
        timestamp: Instant,
        address: A,
    },
    /// An attempt failed with a cause not yet reported in a row in this cycle.
    FailedToConnect {
        server_name: Arc<str>,
        timestamp: Instant,
        error: Arc<ConnectError>,
        /// Normalized cause used for repeated-failure suppression.
        cause: String,
    },
    /// A connection is live and published to readers.
    Connected {
        server_name: Arc<str>,
        timestamp: Instant,
    },
    /// The live connection finished closing.
    Disconnected {
        server_name: Arc<str>,
        timestamp: Instant,
    },
}

impl<A: Address> LifecycleEvent for ConnectionEvent<A> {
    fn event_type(&self) -> &'static str {
        match self {
            ConnectionEvent::AttemptingToConnect { .. } => "attempting_to_connect",
            ConnectionEvent::ObtainedAddress { .. } => "obtained_address",
            ConnectionEvent::FailedToConnect { .. } => "failed_to_connect",
            ConnectionEvent::Connected { .. } => "connected",
            ConnectionEvent::Disconnected { .. } => "disconnected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ConnectionEvent::AttemptingToConnect { timestamp, .. }
            | ConnectionEvent::ObtainedAddress { timestamp, .. }
            | ConnectionEvent::FailedToConnect { timestamp, .. }
            | ConnectionEvent::Connected { timestamp, .. }
            | ConnectionEvent::Disconnected { timestamp, .. } => *timestamp,
        }
    }

    fn server_name(&self) -> &str {
        match self {
            ConnectionEvent::AttemptingToConnect { server_name, .. }
            | ConnectionEvent::ObtainedAddress { server_name, .. }
            | ConnectionEvent::FailedToConnect { server_name, .. }
            | ConnectionEvent::Connected { server_name, .. }
            | ConnectionEvent::Disconnected { server_name, .. } => server_name,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            ConnectionEvent::FailedToConnect { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }
}

/// Delivers events to the configured listeners, then to the log.
pub(crate) struct EventDispatcher<A: Address> {
    server_name: Arc<str>,
    listeners: Listeners<ConnectionEvent<A>>,
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    log_events: bool,
}

impl<A: Address> EventDispatcher<A> {
    pub(crate) fn new(
        server_name: Arc<str>,
        listeners: Listeners<ConnectionEvent<A>>,
        log_events: bool,
    ) -> Self {
        Self {
            server_name,
            listeners,
            log_events,
        }
    }

    pub(crate) fn server_name(&self) -> &Arc<str> {
        &self.server_name
    }

    pub(crate) fn attempting_to_connect(&self) {
        self.handle(ConnectionEvent::AttemptingToConnect {
            server_name: self.server_name.clone(),
            timestamp: Instant::now(),
        });
    }

    pub(crate) fn obtained_address(&self, address: A) {
        self.handle(ConnectionEvent::ObtainedAddress {
            server_name: self.server_name.clone(),
            timestamp: Instant::now(),
            address,
        });
    }

    pub(crate) fn failed_to_connect(&self, error: ConnectError, cause: String) {
        self.handle(ConnectionEvent::FailedToConnect {
            server_name: self.server_name.clone(),
            timestamp: Instant::now(),
            error: Arc::new(error),
            cause,
        });
    }

    pub(crate) fn connected(&self) {
        self.handle(ConnectionEvent::Connected {
            server_name: self.server_name.clone(),
            timestamp: Instant::now(),
        });
    }

    pub(crate) fn disconnected(&self) {
        self.handle(ConnectionEvent::Disconnected {
            server_name: self.server_name.clone(),
            timestamp: Instant::now(),
        });
    }

    fn handle(&self, event: ConnectionEvent<A>) {
        let panicked = self.listeners.dispatch(&event);

        #[cfg(feature = "tracing")]
        {
            if panicked > 0 {
                tracing::warn!(
                    persistent_connection_to = &*self.server_name,
                    event = event.event_type(),
                    panicked,
                    "event listener panicked"
                );
            }
            if self.log_events {
                self.log(&event);
            }
        }

        #[cfg(not(feature = "tracing"))]
        let _ = panicked;
    }

    #[cfg(feature = "tracing")]
    fn log(&self, event: &ConnectionEvent<A>) {
        let server = &*self.server_name;
        let kind = event.event_type();
        let message = match event {
            ConnectionEvent::ObtainedAddress { address, .. } => {
                format!("obtained address {address:?}")
            }
            ConnectionEvent::FailedToConnect { error, cause, .. } => {
                format!("failed to connect: {cause} ({error})")
            }
            _ => kind.replace('_', " "),
        };
        match event.severity() {
            Severity::Error => {
                tracing::error!(persistent_connection_to = server, event = kind, "{message}");
            }
            Severity::Info => {
                tracing::info!(persistent_connection_to = server, event = kind, "{message}");
            }
        }
    }
}
