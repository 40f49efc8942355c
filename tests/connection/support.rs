//! Scripted collaborators and an event recorder for driving the engine.

use futures::future::BoxFuture;
use persistent_connection::{
    BoxError, Connection, ConnectionConfig, ConnectionConfigBuilder, ConnectionEvent,
    PersistentConnection, RetryDelay,
};
use persistent_connection_core::Signal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

pub const RETRY: Duration = Duration::from_secs(10);

/// Connection double that counts `close` calls and can be dropped by the
/// "remote" side.
#[derive(Clone)]
pub struct MockConnection {
    pub id: usize,
    inner: Arc<MockInner>,
}

struct MockInner {
    closed: Signal,
    dead: AtomicBool,
    close_calls: AtomicUsize,
}

impl MockConnection {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            inner: Arc::new(MockInner {
                closed: Signal::new(),
                dead: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// The peer hung up.
    pub fn drop_remotely(&self) {
        self.inner.dead.store(true, Ordering::SeqCst);
        self.inner.closed.fire();
    }

    /// Reports closed without signalling it yet, as a handle does between
    /// noticing a dead socket and finishing its teardown.
    pub fn mark_dead(&self) {
        self.inner.dead.store(true, Ordering::SeqCst);
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    fn close(&self) -> BoxFuture<'_, ()> {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.dead.store(true, Ordering::SeqCst);
        self.inner.closed.fire();
        Box::pin(async {})
    }

    fn closed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.inner.closed.fired())
    }

    fn is_closed(&self) -> bool {
        self.inner.dead.load(Ordering::SeqCst)
    }
}

/// What the scripted connector does on one call.
#[derive(Clone)]
pub enum Step {
    Fail(&'static str),
    Succeed,
    /// Succeeds once the gate is notified.
    Hold(Arc<Notify>),
}

/// Hands out steps in order, repeating the last one forever.
struct Script<T> {
    steps: Mutex<VecDeque<T>>,
}

impl<T: Clone> Script<T> {
    fn new(steps: Vec<T>) -> Self {
        assert!(!steps.is_empty(), "a script needs at least one step");
        Self {
            steps: Mutex::new(steps.into()),
        }
    }

    fn next(&self) -> T {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap()
        }
    }
}

/// Simplified event record for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Attempting,
    Address(String),
    Failed(String),
    Connected,
    Disconnected,
}

impl Seen {
    pub fn from_event(event: &ConnectionEvent<String>) -> Self {
        match event {
            ConnectionEvent::AttemptingToConnect { .. } => Seen::Attempting,
            ConnectionEvent::ObtainedAddress { address, .. } => Seen::Address(address.clone()),
            ConnectionEvent::FailedToConnect { cause, .. } => Seen::Failed(cause.clone()),
            ConnectionEvent::Connected { .. } => Seen::Connected,
            ConnectionEvent::Disconnected { .. } => Seen::Disconnected,
        }
    }
}

pub type EventLog = Arc<Mutex<Vec<(Seen, Instant)>>>;

/// Adds a listener that appends every event, stamped with the Tokio clock.
pub fn record_into(
    builder: ConnectionConfigBuilder<String>,
    log: &EventLog,
) -> ConnectionConfigBuilder<String> {
    let log = Arc::clone(log);
    builder.on_event(move |event| {
        log.lock()
            .unwrap()
            .push((Seen::from_event(event), Instant::now()));
    })
}

pub fn seen(log: &EventLog) -> Vec<Seen> {
    log.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
}

/// A running engine wired to scripted collaborators.
pub struct Harness {
    pub conn: PersistentConnection<String, MockConnection>,
    log: EventLog,
    made: Arc<Mutex<Vec<MockConnection>>>,
    connect_calls: Arc<Mutex<Vec<Instant>>>,
}

impl Harness {
    /// Starts with a fixed 10s retry delay.
    pub fn start(resolves: Vec<Result<&'static str, &'static str>>, connects: Vec<Step>) -> Self {
        Self::start_with(resolves, connects, |builder| {
            builder.retry_delay(RetryDelay::fixed(RETRY))
        })
    }

    pub fn start_with<F>(
        resolves: Vec<Result<&'static str, &'static str>>,
        connects: Vec<Step>,
        configure: F,
    ) -> Self
    where
        F: FnOnce(ConnectionConfigBuilder<String>) -> ConnectionConfigBuilder<String>,
    {
        let log: EventLog = Arc::default();
        let made: Arc<Mutex<Vec<MockConnection>>> = Arc::default();
        let connect_calls: Arc<Mutex<Vec<Instant>>> = Arc::default();

        let builder = configure(ConnectionConfig::builder("test-server"));
        let config = record_into(builder, &log).build();

        let resolves = Arc::new(Script::new(resolves));
        let resolver = move || {
            let step = resolves.next();
            async move { step.map(str::to_string).map_err(BoxError::from) }
        };

        let connects = Arc::new(Script::new(connects));
        let connector = {
            let made = Arc::clone(&made);
            let connect_calls = Arc::clone(&connect_calls);
            move |_address: String| {
                connect_calls.lock().unwrap().push(Instant::now());
                let step = connects.next();
                let made = Arc::clone(&made);
                async move {
                    if let Step::Hold(gate) = &step {
                        gate.notified().await;
                    }
                    match step {
                        Step::Fail(cause) => Err(BoxError::from(cause)),
                        Step::Succeed | Step::Hold(_) => {
                            let mut made = made.lock().unwrap();
                            let connection = MockConnection::new(made.len());
                            made.push(connection.clone());
                            Ok(connection)
                        }
                    }
                }
            }
        };

        Self {
            conn: PersistentConnection::create(config, resolver, connector),
            log,
            made,
            connect_calls,
        }
    }

    pub fn events(&self) -> Vec<Seen> {
        seen(&self.log)
    }

    /// Connections produced so far, in order.
    pub fn made(&self) -> Vec<MockConnection> {
        self.made.lock().unwrap().clone()
    }

    /// When each connector call started.
    pub fn connect_calls(&self) -> Vec<Instant> {
        self.connect_calls.lock().unwrap().clone()
    }
}

/// Lets spawned tasks run to their next await point.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Asserts `later - earlier` is `expected`, within timer granularity.
pub fn assert_gap(earlier: Instant, later: Instant, expected: Duration) {
    let gap = later - earlier;
    let slack = Duration::from_millis(5);
    assert!(
        gap + slack >= expected && gap <= expected + slack,
        "expected a gap of {expected:?}, got {gap:?}"
    );
}
