//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Accept a socket and run the TLS handshake through a backend session
//! - Track connection state (Undefined → Established → Closing → Closed)
//! - Drive graceful shutdown, forcing it once the deadline passes
//! - Expose plaintext I/O to the HTTP layer through [`ByteStream`]
//!
//! # Invariants
//! - A session exists only while Established or Closing
//! - The shutdown deadline is fixed on the first close request
//! - The socket is closed exactly once, after the session is gone

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::net::clock::{Clock, SystemClock};
use crate::net::headers::DefaultHeaders;
use crate::net::listener::Listener;
use crate::observability::metrics;
use crate::tls::{SecureSession, ShutdownStatus, TlsError, TransportBackend};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Shutdown completed (or there was no session to shut down).
    Clean,
    /// The peer never acknowledged; the session was torn down at the deadline.
    Forced,
    /// Setup failed, or shutdown itself failed.
    Aborted,
}

impl Closure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Closure::Clean => "clean",
            Closure::Forced => "forced",
            Closure::Aborted => "aborted",
        }
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handshake attempted yet.
    Undefined,
    /// Handshake done; plaintext flows.
    Established,
    /// Waiting for the peer to acknowledge shutdown.
    Closing,
    /// Setup failed or the session was force-destroyed; socket still open.
    Error,
    /// Socket released.
    Closed(Closure),
}

/// The byte-level interface the HTTP layer works against.
pub trait ByteStream {
    /// Read plaintext. `Ok(0)` means the peer closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError>;

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError>;

    /// Bytes that can be read without touching the socket.
    fn pending_byte_count(&mut self) -> usize;

    /// True if new socket bytes arrived or plaintext is already buffered.
    fn can_read_data(&mut self) -> bool;

    fn is_secure(&self) -> bool;
}

/// One client connection, plain or secured by a backend session.
pub struct Connection<S: SecureSession> {
    id: ConnectionId,
    state: ConnectionState,
    socket: Option<TcpStream>,
    fd: Option<RawFd>,
    peer_addr: Option<SocketAddr>,
    session: Option<S>,
    secure: bool,
    default_headers: Option<Arc<DefaultHeaders>>,
    shutdown_timeout: Duration,
    closing_since: Option<Instant>,
    teardown: Closure,
    clock: Arc<dyn Clock>,
    last_activity: Instant,
}

impl<S: SecureSession> Connection<S> {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self::with_clock(shutdown_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(shutdown_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        let last_activity = clock.now();
        Self {
            id: ConnectionId::new(),
            state: ConnectionState::Undefined,
            socket: None,
            fd: None,
            peer_addr: None,
            session: None,
            secure: false,
            default_headers: None,
            shutdown_timeout,
            closing_since: None,
            teardown: Closure::Clean,
            clock,
            last_activity,
        }
    }

    /// Accept a client from `listener` and complete the TLS handshake.
    ///
    /// Blocks in `accept` unless the listener reported readiness, and in the
    /// handshake for as long as the backend allows. On failure the connection
    /// is already torn down when this returns.
    pub fn initialize<B>(
        &mut self,
        listener: &Listener,
        backend: &B,
        context: &B::Context,
        default_headers: Arc<DefaultHeaders>,
    ) -> Result<RawFd, TlsError>
    where
        B: TransportBackend<Session = S>,
    {
        if self.state != ConnectionState::Undefined {
            return Err(TlsError::InvalidState("connection already initialized"));
        }
        self.secure = true;
        self.default_headers = Some(default_headers);

        match self.establish(listener, backend, context) {
            Ok(fd) => {
                self.state = ConnectionState::Established;
                self.touch();
                tracing::info!(
                    connection_id = %self.id,
                    fd,
                    peer_addr = ?self.peer_addr,
                    backend = backend.name(),
                    alpn = ?self.negotiated_protocol(),
                    "TLS connection established"
                );
                metrics::record_handshake("success");
                Ok(fd)
            }
            Err(e) => {
                tracing::error!(
                    connection_id = %self.id,
                    fd = ?self.fd,
                    backend = backend.name(),
                    step = e.kind(),
                    error = %e,
                    "Aborting TLS connection setup"
                );
                metrics::record_handshake(e.kind());
                self.state = ConnectionState::Error;
                self.teardown = Closure::Aborted;
                self.close_connection();
                Err(e)
            }
        }
    }

    fn establish<B>(
        &mut self,
        listener: &Listener,
        backend: &B,
        context: &B::Context,
    ) -> Result<RawFd, TlsError>
    where
        B: TransportBackend<Session = S>,
    {
        let (stream, peer_addr) = listener.accept().map_err(TlsError::Accept)?;
        let fd = stream.as_raw_fd();
        self.fd = Some(fd);
        self.peer_addr = Some(peer_addr);

        let bound = backend.bind_session(context, &stream);
        self.socket = Some(stream);
        self.session = Some(bound?);

        if let Some(session) = self.session.as_mut() {
            session.handshake()?;
        }
        Ok(fd)
    }

    /// Accept a client without TLS. I/O goes straight to the socket.
    pub fn initialize_plain(
        &mut self,
        listener: &Listener,
        default_headers: Arc<DefaultHeaders>,
    ) -> Result<RawFd, TlsError> {
        if self.state != ConnectionState::Undefined {
            return Err(TlsError::InvalidState("connection already initialized"));
        }
        self.secure = false;
        self.default_headers = Some(default_headers);

        match listener.accept() {
            Ok((stream, peer_addr)) => {
                let fd = stream.as_raw_fd();
                self.fd = Some(fd);
                self.peer_addr = Some(peer_addr);
                self.socket = Some(stream);
                self.state = ConnectionState::Established;
                self.touch();
                tracing::debug!(connection_id = %self.id, fd, peer_addr = %peer_addr, "Plain connection established");
                Ok(fd)
            }
            Err(e) => {
                tracing::error!(connection_id = %self.id, error = %e, "Could not accept new connection");
                self.state = ConnectionState::Error;
                self.teardown = Closure::Aborted;
                self.close_connection();
                Err(TlsError::Accept(e))
            }
        }
    }

    /// Close the connection, gracefully if the peer cooperates in time.
    ///
    /// Idempotent. Call again while the state is `Closing`; every call is
    /// measured against the deadline set by the first one.
    pub fn close_connection(&mut self) {
        if self.is_closed() {
            return;
        }

        if self.state != ConnectionState::Error {
            if self.state != ConnectionState::Closing {
                self.closing_since = Some(self.clock.now());
            }
            self.state = ConnectionState::Closing;
        }

        if self.session.is_some() {
            self.drive_shutdown();
        }

        if self.session.is_none() {
            self.close_socket();
        }
    }

    fn drive_shutdown(&mut self) {
        if self.state == ConnectionState::Error {
            self.destroy_session();
            return;
        }

        if self.shutdown_deadline_reached() {
            self.force_teardown();
            return;
        }

        let status = match self.session.as_mut() {
            Some(session) => session.shutdown(),
            None => return,
        };

        match status {
            ShutdownStatus::Done => {
                self.teardown = Closure::Clean;
                self.destroy_session();
            }
            ShutdownStatus::Failed => {
                tracing::debug!(connection_id = %self.id, fd = ?self.fd, "TLS shutdown failed");
                self.teardown = Closure::Aborted;
                self.destroy_session();
            }
            ShutdownStatus::InProgress => {
                if self.shutdown_deadline_reached() {
                    self.force_teardown();
                }
            }
        }
    }

    fn force_teardown(&mut self) {
        tracing::warn!(
            connection_id = %self.id,
            fd = ?self.fd,
            error = %TlsError::Timeout(self.shutdown_timeout),
            "TLS shutdown did not receive close notification from the client"
        );
        self.destroy_session();
        self.state = ConnectionState::Error;
        self.teardown = Closure::Forced;
    }

    fn shutdown_deadline_reached(&self) -> bool {
        match self.closing_since {
            Some(since) => self.clock.now().saturating_duration_since(since) >= self.shutdown_timeout,
            None => false,
        }
    }

    fn destroy_session(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session);
            tracing::trace!(connection_id = %self.id, fd = ?self.fd, "TLS session released");
        }
    }

    fn close_socket(&mut self) {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            tracing::trace!(connection_id = %self.id, fd = ?self.fd, "Connection closed");
            metrics::record_closed(self.teardown);
        }
        self.state = ConnectionState::Closed(self.teardown);
    }

    fn touch(&mut self) {
        self.last_activity = self.clock.now();
    }

    fn observe(&mut self, result: &Result<usize, TlsError>) {
        match result {
            Ok(n) if *n > 0 => self.touch(),
            Err(TlsError::Io(e)) => {
                tracing::debug!(connection_id = %self.id, error = %e, "I/O error, closing connection");
                self.close_connection();
            }
            _ => {}
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// How the connection ended, once it has.
    pub fn closure(&self) -> Option<Closure> {
        match self.state {
            ConnectionState::Closed(closure) => Some(closure),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed(_))
    }

    /// Established or Closing: the states in which I/O is allowed.
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Established | ConnectionState::Closing
        )
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn fd(&self) -> Option<RawFd> {
        self.fd
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn default_headers(&self) -> Option<&Arc<DefaultHeaders>> {
        self.default_headers.as_ref()
    }

    /// Instant after which a pending shutdown is forced.
    pub fn shutdown_deadline(&self) -> Option<Instant> {
        self.closing_since
            .and_then(|since| since.checked_add(self.shutdown_timeout))
    }

    /// Time since the last byte moved in either direction.
    pub fn idle_for(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_activity)
    }

    pub fn negotiated_protocol(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|session| session.alpn_protocol())
            .map(|protocol| String::from_utf8_lossy(protocol).into_owned())
    }
}

impl<S: SecureSession> ByteStream for Connection<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        if !self.is_open() {
            return Err(TlsError::InvalidState("connection is not open"));
        }
        let result = match (self.session.as_mut(), self.socket.as_mut()) {
            (Some(session), _) => session.read(buf),
            (None, Some(socket)) => socket.read(buf).map_err(TlsError::read_io),
            (None, None) => Err(TlsError::InvalidState("connection has no socket")),
        };
        self.observe(&result);
        result
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        if !self.is_open() {
            return Err(TlsError::InvalidState("connection is not open"));
        }
        let result = match (self.session.as_mut(), self.socket.as_mut()) {
            (Some(session), _) => session.write(buf),
            (None, Some(socket)) => socket.write(buf).map_err(TlsError::Io),
            (None, None) => Err(TlsError::InvalidState("connection has no socket")),
        };
        self.observe(&result);
        result
    }

    fn pending_byte_count(&mut self) -> usize {
        if !self.is_open() {
            return 0;
        }
        self.session
            .as_mut()
            .map(|session| session.pending_plaintext())
            .unwrap_or(0)
    }

    fn can_read_data(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        let socket_ready = self.socket.as_ref().map(socket_readable).unwrap_or(false);
        socket_ready || self.pending_byte_count() > 0
    }

    fn is_secure(&self) -> bool {
        self.secure
    }
}

impl<S: SecureSession> Drop for Connection<S> {
    fn drop(&mut self) {
        self.close_connection();
        if !self.is_closed() {
            tracing::debug!(connection_id = %self.id, fd = ?self.fd, "Dropping connection mid-shutdown");
            self.destroy_session();
            self.teardown = Closure::Aborted;
            self.close_socket();
        }
    }
}

/// Non-blocking readiness probe on the raw socket.
fn socket_readable(socket: &TcpStream) -> bool {
    if socket.set_nonblocking(true).is_err() {
        return false;
    }
    let mut probe = [0u8; 1];
    let readable = match socket.peek(&mut probe) {
        Ok(_) => true,
        // Errors surface on the next read.
        Err(e) => e.kind() != std::io::ErrorKind::WouldBlock,
    };
    if let Err(e) = socket.set_nonblocking(false) {
        tracing::debug!(error = %e, "Could not restore blocking mode");
    }
    readable
}
