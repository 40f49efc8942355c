use crate::attempt;
use crate::backoff::RetryDelay;
use crate::config::ConnectionConfig;
use crate::connector::{Address, Connect, Connection, Resolve};
use crate::events::EventDispatcher;
use crate::slot::{Generations, Outcome};
use crate::state::ConnectionState;
use persistent_connection_core::Signal;
use std::sync::Arc;

/// State shared between the engine task, readers, and the shutdown task.
pub(crate) struct Shared<A: Address, C: Connection> {
    pub(crate) events: EventDispatcher<A>,
    pub(crate) retry_delay: RetryDelay,
    pub(crate) resolver: Box<dyn Resolve<A>>,
    pub(crate) connector: Box<dyn Connect<A, C>>,
    pub(crate) generations: Generations<C>,
    pub(crate) shutdown_requested: Signal,
    pub(crate) shutdown_complete: Signal,
}

impl<A: Address, C: Connection> Shared<A, C> {
    /// The engine: one reconnection cycle per loop iteration until shutdown.
    async fn run(self: Arc<Self>) {
        loop {
            self.events.attempting_to_connect();

            // Spaces the starts of cycles, so a connection that lived longer
            // than this reconnects immediately after dropping.
            let ready_to_retry = tokio::time::sleep(self.retry_delay.next_delay());
            tokio::pin!(ready_to_retry);

            let outcome = attempt::connect_until_ready(&self).await;
            self.generations.current().resolve(outcome.clone());

            let connection = match outcome {
                Outcome::Ready(connection) => connection,
                Outcome::ShuttingDown => return,
            };

            self.events.connected();
            #[cfg(feature = "metrics")]
            {
                let server = self.events.server_name().to_string();
                metrics::counter!("persistent_connection_connects_total", "server" => server.clone()).increment(1);
                metrics::gauge!("persistent_connection_connected", "server" => server).set(1.0);
            }

            connection.closed().await;
            let next = self.generations.advance();
            self.events.disconnected();
            #[cfg(feature = "metrics")]
            {
                let server = self.events.server_name().to_string();
                metrics::counter!("persistent_connection_disconnects_total", "server" => server.clone()).increment(1);
                metrics::gauge!("persistent_connection_connected", "server" => server).set(0.0);
            }

            tokio::select! {
                biased;
                _ = self.shutdown_requested.fired() => {
                    next.resolve(Outcome::ShuttingDown);
                    return;
                }
                _ = &mut ready_to_retry => {}
            }
        }
    }

    /// Closes whatever connection the engine publishes until the engine
    /// publishes `ShuttingDown`, then marks shutdown complete.
    ///
    /// Must only run after `shutdown_requested` fired, and only once.
    async fn shut_down(self: Arc<Self>) {
        loop {
            let slot = self.generations.current();
            match slot.resolved().await {
                Outcome::ShuttingDown => break,
                Outcome::Ready(connection) => {
                    connection.close().await;
                    connection.closed().await;
                    self.generations.superseded(&slot).await;
                }
            }
        }
        self.shutdown_complete.fire();
    }

    fn request_shutdown(self: &Arc<Self>) {
        if self.shutdown_requested.fire() {
            tokio::spawn(Arc::clone(self).shut_down());
        }
    }
}

/// Requests shutdown when the last user handle is dropped.
struct CloseOnDrop<A: Address, C: Connection>(Arc<Shared<A, C>>);

impl<A: Address, C: Connection> Drop for CloseOnDrop<A, C> {
    fn drop(&mut self) {
        if tokio::runtime::Handle::try_current().is_ok() {
            self.0.request_shutdown();
        } else {
            self.0.shutdown_requested.fire();
        }
    }
}

/// A single logical connection that is kept alive forever.
///
/// Creating one spawns an engine task that resolves the server's address,
/// connects, waits for the connection to close, and starts over, pacing
/// attempts with a jittered [`RetryDelay`]. Handles are cheap to clone and
/// all refer to the same engine. Dropping the last handle requests shutdown.
///
/// # Examples
///
/// ```no_run
/// use persistent_connection::{ConnectionConfig, PersistentConnection, StaticAddress, TcpConnector, TcpOptions};
/// use std::net::SocketAddr;
///
/// # async fn demo() {
/// let address: SocketAddr = "127.0.0.1:7000".parse().unwrap();
/// let config = ConnectionConfig::builder("ledger").build();
/// let conn = PersistentConnection::create(
///     config,
///     StaticAddress::new(address),
///     TcpConnector::new(TcpOptions::default()),
/// );
///
/// let live = conn.connected().await;
/// live.send(b"hello").await.ok();
/// conn.close().await;
/// # }
/// ```
pub struct PersistentConnection<A: Address, C: Connection> {
    shared: Arc<Shared<A, C>>,
    _owner: Arc<CloseOnDrop<A, C>>,
}

impl<A: Address, C: Connection> Clone for PersistentConnection<A, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _owner: Arc::clone(&self._owner),
        }
    }
}

impl<A: Address, C: Connection> std::fmt::Debug for PersistentConnection<A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentConnection")
            .field("server_name", &self.server_name())
            .field("state", &self.state())
            .finish()
    }
}

impl<A: Address, C: Connection> PersistentConnection<A, C> {
    /// Starts the engine and returns a handle to it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn create<R, K>(config: ConnectionConfig<A>, resolver: R, connector: K) -> Self
    where
        R: Resolve<A>,
        K: Connect<A, C>,
    {
        #[cfg(feature = "metrics")]
        {
            use metrics::{describe_counter, describe_gauge};
            describe_counter!(
                "persistent_connection_attempts_total",
                "Total number of resolve-and-connect attempts"
            );
            describe_counter!(
                "persistent_connection_failures_total",
                "Total number of failed connection attempts"
            );
            describe_counter!(
                "persistent_connection_connects_total",
                "Total number of connections published"
            );
            describe_counter!(
                "persistent_connection_disconnects_total",
                "Total number of published connections that closed"
            );
            describe_gauge!(
                "persistent_connection_connected",
                "Whether a live connection is published (1) or not (0)"
            );
        }

        let shared = Arc::new(Shared {
            events: EventDispatcher::new(config.server_name, config.listeners, config.log_events),
            retry_delay: config.retry_delay,
            resolver: Box::new(resolver),
            connector: Box::new(connector),
            generations: Generations::new(),
            shutdown_requested: Signal::new(),
            shutdown_complete: Signal::new(),
        });

        tokio::spawn(Arc::clone(&shared).run());

        Self {
            _owner: Arc::new(CloseOnDrop(Arc::clone(&shared))),
            shared,
        }
    }

    /// Name of the server this connection targets.
    pub fn server_name(&self) -> &str {
        self.shared.events.server_name()
    }

    /// Waits for a live connection.
    ///
    /// Returns the first connection that is not already closed. Once shutdown
    /// has begun this never completes; wrap it in a timeout or select against
    /// [`close_finished`](Self::close_finished) when that matters.
    ///
    /// A connection returned here can still be closed concurrently right
    /// afterwards; await its own close signal to observe that.
    pub async fn connected(&self) -> C {
        loop {
            let slot = self.shared.generations.current();
            match slot.resolved().await {
                Outcome::ShuttingDown => return std::future::pending().await,
                Outcome::Ready(connection) if !connection.is_closed() => return connection,
                Outcome::Ready(connection) => {
                    connection.closed().await;
                    self.shared.generations.superseded(&slot).await;
                }
            }
        }
    }

    /// The published connection, if there is one right now.
    ///
    /// Unlike [`connected`](Self::connected) this does not check liveness.
    pub fn current_connection(&self) -> Option<C> {
        match self.shared.generations.current().peek() {
            Some(Outcome::Ready(connection)) => Some(connection),
            _ => None,
        }
    }

    /// Shuts the engine down and closes the live connection, if any.
    ///
    /// Idempotent: every call, concurrent or later, completes when the one
    /// shutdown finishes, and the connection is closed exactly once. The
    /// shutdown keeps running if this future is dropped.
    pub async fn close(&self) {
        self.shared.request_shutdown();
        self.shared.shutdown_complete.fired().await;
    }

    /// Completes once shutdown has finished. Does not start a shutdown.
    pub async fn close_finished(&self) {
        self.shared.shutdown_complete.fired().await;
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.shutdown_requested.is_fired()
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        if self.shared.shutdown_complete.is_fired() {
            return ConnectionState::Closed;
        }
        if self.shared.shutdown_requested.is_fired() {
            return ConnectionState::ShuttingDown;
        }
        match self.shared.generations.current().peek() {
            Some(Outcome::Ready(_)) => ConnectionState::Connected,
            Some(Outcome::ShuttingDown) => ConnectionState::ShuttingDown,
            None => ConnectionState::Connecting,
        }
    }
}
