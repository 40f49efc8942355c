//! A ready-made TCP connection handle.
//!
//! Messages are framed with a 4-byte big-endian length prefix. Zero-length
//! frames are heartbeats: they keep the idle timer alive and are never
//! delivered to [`TcpConnection::recv`].

use crate::config::ConnectionConfig;
use crate::connector::{Connect, Connection, Resolve};
use crate::engine::PersistentConnection;
use crate::error::BoxError;
use futures::future::BoxFuture;
use persistent_connection_core::Signal;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Errors from the TCP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection is closed or closing.
    #[error("connection closed")]
    Closed,

    /// A frame exceeded the configured message size limit.
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge {
        /// Size of the offending message.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Connecting did not finish in time.
    #[error("connect did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    /// Socket error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Builds the TCP stream for an address in place of the default dialer.
pub type TransportFn =
    Arc<dyn Fn(SocketAddr) -> BoxFuture<'static, io::Result<TcpStream>> + Send + Sync>;

/// Liveness probing for an otherwise quiet connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// How often a heartbeat frame is sent.
    pub interval: Duration,
    /// Close the connection after receiving nothing for this long.
    pub timeout: Duration,
}

/// Transport settings passed through to every connect.
///
/// None of these affect reconnection pacing.
#[derive(Clone)]
pub struct TcpOptions {
    bind_interface: Option<IpAddr>,
    max_message_size: usize,
    receive_buffer: usize,
    handshake_timeout: Duration,
    heartbeat: Option<Heartbeat>,
    transport: Option<TransportFn>,
}

impl TcpOptions {
    /// Default message size limit: 16 MiB.
    pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

    /// Default number of received messages buffered before reading pauses.
    pub const DEFAULT_RECEIVE_BUFFER: usize = 64;

    /// Default handshake timeout: 10 seconds.
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Binds outgoing sockets to a local interface address.
    pub fn bind_interface(mut self, ip: IpAddr) -> Self {
        self.bind_interface = Some(ip);
        self
    }

    /// Largest message accepted in either direction.
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Received messages buffered ahead of [`TcpConnection::recv`]. Once
    /// full, the socket is not read until a message is consumed. At least 1.
    pub fn receive_buffer(mut self, messages: usize) -> Self {
        self.receive_buffer = messages.max(1);
        self
    }

    /// Time allowed for establishing the stream.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enables heartbeats.
    pub fn heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Replaces the default dialer. `bind_interface` is ignored when set;
    /// the handshake timeout still applies.
    pub fn transport<F>(mut self, f: F) -> Self
    where
        F: Fn(SocketAddr) -> BoxFuture<'static, io::Result<TcpStream>> + Send + Sync + 'static,
    {
        self.transport = Some(Arc::new(f));
        self
    }

    async fn open(&self, address: SocketAddr) -> Result<TcpConnection, TransportError> {
        let connecting = async {
            match &self.transport {
                Some(make) => make(address).await,
                None => dial(address, self.bind_interface).await,
            }
        };
        let stream = tokio::time::timeout(self.handshake_timeout, connecting)
            .await
            .map_err(|_| TransportError::HandshakeTimeout(self.handshake_timeout))??;
        stream.set_nodelay(true)?;
        TcpConnection::start(
            stream,
            self.max_message_size,
            self.receive_buffer,
            self.heartbeat,
        )
    }
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            bind_interface: None,
            max_message_size: Self::DEFAULT_MAX_MESSAGE_SIZE,
            receive_buffer: Self::DEFAULT_RECEIVE_BUFFER,
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
            heartbeat: None,
            transport: None,
        }
    }
}

impl std::fmt::Debug for TcpOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpOptions")
            .field("bind_interface", &self.bind_interface)
            .field("max_message_size", &self.max_message_size)
            .field("receive_buffer", &self.receive_buffer)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("heartbeat", &self.heartbeat)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

async fn dial(address: SocketAddr, bind: Option<IpAddr>) -> io::Result<TcpStream> {
    let socket = if address.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    if let Some(ip) = bind {
        socket.bind(SocketAddr::new(ip, 0))?;
    }
    socket.connect(address).await
}

/// Connector producing [`TcpConnection`]s.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    options: TcpOptions,
}

impl TcpConnector {
    /// A connector using `options` for every connection.
    pub fn new(options: TcpOptions) -> Self {
        Self { options }
    }

    /// The transport options.
    pub fn options(&self) -> &TcpOptions {
        &self.options
    }
}

impl Connect<SocketAddr, TcpConnection> for TcpConnector {
    fn connect(&self, address: SocketAddr) -> BoxFuture<'_, Result<TcpConnection, BoxError>> {
        Box::pin(async move { self.options.open(address).await.map_err(BoxError::from) })
    }
}

impl PersistentConnection<SocketAddr, TcpConnection> {
    /// Keeps a TCP connection alive, forwarding `options` to every connect.
    pub fn tcp<R>(config: ConnectionConfig<SocketAddr>, resolver: R, options: TcpOptions) -> Self
    where
        R: Resolve<SocketAddr>,
    {
        Self::create(config, resolver, TcpConnector::new(options))
    }
}

/// A framed TCP connection.
///
/// Writes go through a bounded queue to a dedicated writer task and reads are
/// buffered in a bounded queue of [`TcpOptions::receive_buffer`] messages.
/// When that queue is full the socket is no longer read, so the peer sees
/// backpressure instead of the process buffering without limit. With
/// heartbeats enabled, a queue left full past the heartbeat timeout closes the
/// connection.
#[derive(Clone)]
pub struct TcpConnection {
    inner: Arc<Inner>,
}

struct Inner {
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    max_message_size: usize,
    outgoing: mpsc::Sender<Outgoing>,
    incoming: Mutex<mpsc::Receiver<Vec<u8>>>,
    closing: Signal,
    closed: Signal,
}

/// A frame queued for the writer task. Heartbeats carry no acknowledgement.
struct Outgoing {
    payload: Vec<u8>,
    ack: Option<oneshot::Sender<Result<(), TransportError>>>,
}

const SEND_QUEUE: usize = 32;

impl TcpConnection {
    fn start(
        stream: TcpStream,
        max_message_size: usize,
        receive_buffer: usize,
        heartbeat: Option<Heartbeat>,
    ) -> Result<Self, TransportError> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let (reader, writer) = stream.into_split();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(SEND_QUEUE);
        let (incoming_tx, incoming_rx) = mpsc::channel(receive_buffer.max(1));
        let (seen_tx, seen_rx) = watch::channel(Instant::now());

        let inner = Arc::new(Inner {
            peer_addr,
            local_addr,
            max_message_size,
            outgoing: outgoing_tx,
            incoming: Mutex::new(incoming_rx),
            closing: Signal::new(),
            closed: Signal::new(),
        });

        let reader = tokio::spawn(read_frames(reader, max_message_size, incoming_tx, seen_tx));
        let writer = tokio::spawn(write_frames(writer, outgoing_rx));
        tokio::spawn(drive(Arc::clone(&inner), reader, writer, seen_rx, heartbeat));

        Ok(Self { inner })
    }

    /// Remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Sends one message and waits until it was written to the socket.
    ///
    /// Returns [`TransportError::Closed`] as soon as the connection starts
    /// closing, even if the peer has stopped reading and the write is stuck.
    pub async fn send(&self, message: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if message.len() > self.inner.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: message.len(),
                limit: self.inner.max_message_size,
            });
        }

        let (ack, written) = oneshot::channel();
        let frame = Outgoing {
            payload: message.to_vec(),
            ack: Some(ack),
        };
        let write = async {
            self.inner
                .outgoing
                .send(frame)
                .await
                .map_err(|_| TransportError::Closed)?;
            written.await.map_err(|_| TransportError::Closed)?
        };

        tokio::select! {
            biased;
            _ = self.inner.closing.fired() => Err(TransportError::Closed),
            result = write => result,
        }
    }

    /// Receives the next message, or `None` once the connection has closed
    /// and every message received before that was consumed.
    pub async fn recv(&self) -> Option<Vec<u8>> {
        self.inner.incoming.lock().await.recv().await
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("peer_addr", &self.inner.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection for TcpConnection {
    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.inner.closing.fire();
            self.inner.closed.fired().await;
        })
    }

    fn closed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.inner.closed.fired())
    }

    fn is_closed(&self) -> bool {
        self.inner.closing.is_fired() || self.inner.closed.is_fired()
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, payload: &[u8]) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::MessageTooLarge {
        size: payload.len(),
        limit: u32::MAX as usize,
    })?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes queued frames in order. Stops at the first failed write.
async fn write_frames(mut writer: OwnedWriteHalf, mut outgoing: mpsc::Receiver<Outgoing>) {
    while let Some(Outgoing { payload, ack }) = outgoing.recv().await {
        let result = write_frame(&mut writer, &payload).await;
        let failed = result.is_err();
        #[cfg(feature = "tracing")]
        if let Err(error) = &result {
            tracing::debug!(%error, "tcp write failed");
        }
        if let Some(ack) = ack {
            let _ = ack.send(result);
        }
        if failed {
            return;
        }
    }
}

async fn read_frames(
    mut reader: OwnedReadHalf,
    limit: usize,
    incoming: mpsc::Sender<Vec<u8>>,
    last_seen: watch::Sender<Instant>,
) -> Result<(), TransportError> {
    loop {
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if len > limit {
            return Err(TransportError::MessageTooLarge { size: len, limit });
        }
        let mut frame = vec![0; len];
        reader.read_exact(&mut frame).await?;
        last_seen.send_replace(Instant::now());
        if !frame.is_empty() && incoming.send(frame).await.is_err() {
            return Ok(());
        }
    }
}

/// Owns the connection's lifetime: sends heartbeats and tears the socket
/// down on local close, remote close, write failure, or idle timeout.
///
/// Nothing here waits on socket I/O, so `closing` is always observed.
async fn drive(
    inner: Arc<Inner>,
    mut reader: JoinHandle<Result<(), TransportError>>,
    mut writer: JoinHandle<()>,
    last_seen: watch::Receiver<Instant>,
    heartbeat: Option<Heartbeat>,
) {
    let mut ticker = heartbeat.map(|hb| {
        let mut ticker = tokio::time::interval(hb.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            biased;
            _ = inner.closing.fired() => break,
            result = &mut reader => {
                #[cfg(feature = "tracing")]
                if let Ok(Err(error)) = result {
                    tracing::debug!(peer = %inner.peer_addr, %error, "tcp read failed");
                }
                #[cfg(not(feature = "tracing"))]
                drop(result);
                break;
            }
            _ = &mut writer => break,
            _ = tick(&mut ticker) => {
                if let Some(hb) = heartbeat {
                    if last_seen.borrow().elapsed() > hb.timeout {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(peer = %inner.peer_addr, timeout = ?hb.timeout, "heartbeat timed out");
                        break;
                    }
                }
                // A full queue means frames are already on their way.
                let _ = inner.outgoing.try_send(Outgoing { payload: Vec::new(), ack: None });
            }
        }
    }

    // Dropping the halves shuts the socket down; a stuck write is abandoned.
    reader.abort();
    writer.abort();
    inner.closing.fire();
    inner.closed.fire();
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
