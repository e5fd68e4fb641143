//! Session-object backend.
//!
//! Explicit context and session handles over `rustls::ServerConnection`.
//! Binding, handshaking and shutting down are separate calls, and shutdown
//! is a negotiation: the first call sends close-notify, later calls poll the
//! socket for the peer's answer without blocking.

use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ServerConfig, ServerConnection};

use crate::tls::plaintext;
use crate::tls::{Certificate, SecureSession, ShutdownStatus, TlsError, TlsSettings, TransportBackend};

/// Backend that drives a `ServerConnection` record by record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionBackend;

/// Shared server context for [`SessionBackend`].
#[derive(Debug, Clone)]
pub struct SessionContext {
    config: Arc<ServerConfig>,
    handshake_timeout: Duration,
}

impl TransportBackend for SessionBackend {
    type Context = SessionContext;
    type Session = ObjectSession;

    fn name(&self) -> &'static str {
        "session"
    }

    fn create_context(
        &self,
        certificate: &Certificate,
        settings: &TlsSettings,
    ) -> Result<Self::Context, TlsError> {
        let config = super::server_config(certificate, settings)?;
        Ok(SessionContext {
            config: Arc::new(config),
            handshake_timeout: settings.handshake_timeout,
        })
    }

    fn bind_session(
        &self,
        context: &Self::Context,
        socket: &TcpStream,
    ) -> Result<Self::Session, TlsError> {
        let conn = ServerConnection::new(Arc::clone(&context.config))
            .map_err(|e| TlsError::Allocation(e.to_string()))?;
        let socket = socket
            .try_clone()
            .map_err(|e| TlsError::Bind(e.to_string()))?;

        Ok(ObjectSession {
            conn,
            socket,
            handshake_timeout: context.handshake_timeout,
            close_notify_sent: false,
        })
    }
}

/// One TLS session bound to a socket.
pub struct ObjectSession {
    conn: ServerConnection,
    socket: TcpStream,
    handshake_timeout: Duration,
    close_notify_sent: bool,
}

impl ObjectSession {
    fn flush_tls(&mut self) -> io::Result<()> {
        plaintext::flush_records(&mut self.conn, &self.socket)
    }

    fn drive_handshake(&mut self) -> Result<(), TlsError> {
        while self.conn.is_handshaking() {
            if self.conn.wants_write() {
                self.conn
                    .write_tls(&mut self.socket)
                    .map_err(TlsError::handshake_io)?;
                continue;
            }

            let read = self
                .conn
                .read_tls(&mut self.socket)
                .map_err(TlsError::handshake_io)?;
            if read == 0 {
                return Err(TlsError::Handshake(
                    "peer closed the connection during the handshake".to_string(),
                ));
            }

            if let Err(e) = self.conn.process_new_packets() {
                // Let the client see the alert before we give up.
                let _ = self.flush_tls();
                return Err(TlsError::Handshake(e.to_string()));
            }
        }

        self.flush_tls().map_err(TlsError::handshake_io)
    }

    fn poll_close_notify(&mut self) -> ShutdownStatus {
        loop {
            match self.conn.process_new_packets() {
                Ok(state) if state.peer_has_closed() => return ShutdownStatus::Done,
                Ok(_) => {}
                Err(_) => return ShutdownStatus::Failed,
            }

            // Application data still in flight is of no interest any more.
            let _ = io::copy(&mut self.conn.reader(), &mut io::sink());

            match self.conn.read_tls(&mut self.socket) {
                Ok(0) => return ShutdownStatus::Done,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return ShutdownStatus::InProgress
                }
                Err(_) => return ShutdownStatus::Failed,
            }
        }
    }
}

impl SecureSession for ObjectSession {
    fn handshake(&mut self) -> Result<(), TlsError> {
        self.socket
            .set_read_timeout(Some(self.handshake_timeout))
            .map_err(|e| TlsError::Bind(e.to_string()))?;
        let outcome = self.drive_handshake();
        let _ = self.socket.set_read_timeout(None);
        outcome
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        plaintext::read_plaintext(&mut self.conn, &self.socket, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        let written = self.conn.writer().write(buf)?;
        self.flush_tls()?;
        Ok(written)
    }

    fn pending_plaintext(&mut self) -> usize {
        plaintext::pending_plaintext(&mut self.conn, &self.socket)
    }

    fn shutdown(&mut self) -> ShutdownStatus {
        if !self.close_notify_sent {
            self.conn.send_close_notify();
            self.close_notify_sent = true;
        }
        if let Err(e) = self.flush_tls() {
            tracing::debug!(error = %e, "Could not send close notification");
            return ShutdownStatus::Failed;
        }

        if self.socket.set_nonblocking(true).is_err() {
            return ShutdownStatus::Failed;
        }
        let status = self.poll_close_notify();
        if let Err(e) = self.socket.set_nonblocking(false) {
            tracing::debug!(error = %e, "Could not restore blocking mode");
        }
        status
    }

    fn alpn_protocol(&self) -> Option<&[u8]> {
        self.conn.alpn_protocol()
    }
}
