//! Error taxonomy for secure connections.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by TLS backends and the connection state machine.
///
/// None of these cross the connection API as panics; callers see them as
/// return values while the connection moves itself into the matching state.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Context or session object could not be created.
    #[error("could not allocate TLS state: {0}")]
    Allocation(String),

    /// The listening socket did not yield a connection.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The session could not be associated with the accepted socket.
    #[error("could not bind TLS session to socket: {0}")]
    Bind(String),

    /// Protocol negotiation failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Read or write failure after establishment.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No plaintext is available right now.
    #[error("operation would block")]
    WouldBlock,

    /// The peer did not acknowledge the shutdown in time.
    #[error("close notification not received within {0:?}")]
    Timeout(Duration),

    /// The operation is not valid in the connection's current state.
    #[error("invalid connection state: {0}")]
    InvalidState(&'static str),
}

impl TlsError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TlsError::Allocation(_) => "allocation",
            TlsError::Accept(_) => "accept",
            TlsError::Bind(_) => "bind",
            TlsError::Handshake(_) => "handshake",
            TlsError::Io(_) => "io",
            TlsError::WouldBlock => "would_block",
            TlsError::Timeout(_) => "timeout",
            TlsError::InvalidState(_) => "invalid_state",
        }
    }

    /// Map a socket error seen during the handshake.
    pub(crate) fn handshake_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                TlsError::Handshake("timed out waiting for the client".to_string())
            }
            _ => TlsError::Handshake(err.to_string()),
        }
    }

    /// Map a socket error seen while reading plaintext.
    pub(crate) fn read_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => TlsError::WouldBlock,
            _ => TlsError::Io(err),
        }
    }
}
