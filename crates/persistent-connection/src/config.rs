use crate::backoff::RetryDelay;
use crate::connector::Address;
use crate::events::ConnectionEvent;
use persistent_connection_core::Listeners;
use std::sync::Arc;

/// Configuration for a [`PersistentConnection`](crate::PersistentConnection).
pub struct ConnectionConfig<A: Address> {
    /// Name of the server; used only to tag events and log records.
    pub(crate) server_name: Arc<str>,

    /// Delay between failed attempts, and minimum spacing between the starts
    /// of successive reconnection cycles.
    pub(crate) retry_delay: RetryDelay,

    /// Callbacks invoked for every lifecycle event.
    pub(crate) listeners: Listeners<ConnectionEvent<A>>,

    /// Whether events are also written to the `tracing` log.
    pub(crate) log_events: bool,
}

impl<A: Address> Clone for ConnectionConfig<A> {
    fn clone(&self) -> Self {
        Self {
            server_name: self.server_name.clone(),
            retry_delay: self.retry_delay,
            listeners: self.listeners.clone(),
            log_events: self.log_events,
        }
    }
}

impl<A: Address> std::fmt::Debug for ConnectionConfig<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server_name", &self.server_name)
            .field("retry_delay", &self.retry_delay)
            .field("listeners", &self.listeners.len())
            .field("log_events", &self.log_events)
            .finish()
    }
}

impl<A: Address> ConnectionConfig<A> {
    /// Creates a new builder for a connection to `server_name`.
    pub fn builder(server_name: impl Into<String>) -> ConnectionConfigBuilder<A> {
        ConnectionConfigBuilder::new(server_name)
    }

    /// Returns the server name.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Returns the retry delay policy.
    pub fn retry_delay(&self) -> RetryDelay {
        self.retry_delay
    }

    /// Returns whether events are logged.
    pub fn log_events(&self) -> bool {
        self.log_events
    }

    /// Returns the number of registered event callbacks.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Builder for constructing a [`ConnectionConfig`].
pub struct ConnectionConfigBuilder<A: Address> {
    server_name: String,
    retry_delay: RetryDelay,
    listeners: Listeners<ConnectionEvent<A>>,
    log_events: bool,
}

impl<A: Address> std::fmt::Debug for ConnectionConfigBuilder<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfigBuilder")
            .field("server_name", &self.server_name)
            .field("retry_delay", &self.retry_delay)
            .field("listeners", &self.listeners.len())
            .field("log_events", &self.log_events)
            .finish()
    }
}

impl<A: Address> ConnectionConfigBuilder<A> {
    /// Creates a builder with the default 10s ±30% retry delay and event
    /// logging on.
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            retry_delay: RetryDelay::default(),
            listeners: Listeners::new(),
            log_events: true,
        }
    }

    /// Sets the retry delay policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use persistent_connection::{ConnectionConfig, RetryDelay};
    ///
    /// let config = ConnectionConfig::<String>::builder("cache")
    ///     .retry_delay(RetryDelay::new(Duration::from_secs(2)).jitter(0.5))
    ///     .build();
    /// assert_eq!(config.retry_delay().base(), Duration::from_secs(2));
    /// ```
    pub fn retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Registers a callback for lifecycle events.
    ///
    /// Callbacks run synchronously on the engine task, in registration order,
    /// before the event is logged. A panicking callback is caught and does not
    /// affect the engine or later callbacks.
    ///
    /// # Examples
    ///
    /// ```
    /// use persistent_connection::{ConnectionConfig, ConnectionEvent};
    ///
    /// let config = ConnectionConfig::<String>::builder("cache")
    ///     .on_event(|event| {
    ///         if let ConnectionEvent::FailedToConnect { cause, .. } = event {
    ///             eprintln!("cache unreachable: {cause}");
    ///         }
    ///     })
    ///     .build();
    /// assert_eq!(config.listener_count(), 1);
    /// ```
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectionEvent<A>) + Send + Sync + 'static,
    {
        self.listeners.push_fn(f);
        self
    }

    /// Enables or disables writing events to the `tracing` log.
    ///
    /// Has no effect unless the `tracing` feature is enabled.
    pub fn log_events(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ConnectionConfig<A> {
        ConnectionConfig {
            server_name: Arc::from(self.server_name),
            retry_delay: self.retry_delay,
            listeners: self.listeners,
            log_events: self.log_events,
        }
    }
}
