//! Backend capability contract.
//!
//! # Responsibilities
//! - Build a server context from certificate material
//! - Bind a session to an accepted socket and run the handshake
//! - Move plaintext in and out of a session
//! - Report plaintext already decrypted but not yet delivered
//! - Attempt a graceful close that may need several calls

use std::net::TcpStream;
use std::time::Duration;

use crate::config::TlsConfig;
use crate::tls::{Certificate, TlsError};

/// Result of one graceful shutdown attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStatus {
    /// The session is closed on both sides.
    Done,
    /// Close-notify sent; the peer has not answered yet. Call again later.
    InProgress,
    /// The close could not be carried out (peer reset, broken record).
    Failed,
}

/// Settings that shape the server context and connection teardown.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    /// ALPN identifiers offered to clients, in preference order.
    pub alpn: Vec<String>,
    /// Window for the peer to acknowledge a graceful shutdown.
    pub shutdown_timeout: Duration,
    /// Upper bound on a blocking handshake.
    pub handshake_timeout: Duration,
    /// Server-side session cache entries (0 disables the cache).
    pub session_cache_size: usize,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            alpn: vec!["http/1.1".to_string()],
            shutdown_timeout: Duration::from_millis(3000),
            handshake_timeout: Duration::from_millis(5000),
            session_cache_size: 256,
        }
    }
}

impl From<&TlsConfig> for TlsSettings {
    fn from(config: &TlsConfig) -> Self {
        Self {
            alpn: config.alpn.clone(),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
            handshake_timeout: Duration::from_millis(config.handshake_timeout_ms),
            session_cache_size: config.session_cache_size,
        }
    }
}

/// A concrete TLS implementation.
///
/// The context is built once per server, is read-only afterwards and is
/// shared by every `bind_session` call.
pub trait TransportBackend {
    /// Server-wide configuration built from the certificate.
    type Context;
    /// Per-connection session bound to one socket.
    type Session: SecureSession;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn create_context(
        &self,
        certificate: &Certificate,
        settings: &TlsSettings,
    ) -> Result<Self::Context, TlsError>;

    /// Associate an accepted socket with the context.
    ///
    /// Backends that handshake eagerly do so here and report failures as
    /// `TlsError::Handshake`.
    fn bind_session(
        &self,
        context: &Self::Context,
        socket: &TcpStream,
    ) -> Result<Self::Session, TlsError>;

    /// Release the context. Called once, at server teardown.
    fn destroy_context(&self, context: Self::Context) {
        drop(context);
    }
}

/// A live session. Dropping it releases every backend resource.
pub trait SecureSession {
    /// Run the handshake. A single failure is terminal; there are no retries.
    fn handshake(&mut self) -> Result<(), TlsError>;

    /// Read decrypted bytes. `Ok(0)` means the peer closed the session.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError>;

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError>;

    /// Plaintext decrypted and buffered inside the backend.
    ///
    /// One socket read can decrypt several records, so this may be non-zero
    /// while the socket itself has nothing new to offer.
    fn pending_plaintext(&mut self) -> usize;

    /// Attempt a graceful close. Safe to call repeatedly.
    fn shutdown(&mut self) -> ShutdownStatus;

    /// Protocol selected through ALPN, if any.
    fn alpn_protocol(&self) -> Option<&[u8]> {
        None
    }
}
