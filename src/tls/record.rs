//! Connection-record backend.
//!
//! A single session-creation call accepts the client and completes the
//! handshake before returning. The configuration object carries the ALPN
//! list and a stateless session ticketer. Shutdown is one call: send
//! close-notify, flush, done.

use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ServerConfig, ServerConnection, StreamOwned};

use crate::tls::plaintext;
use crate::tls::{Certificate, SecureSession, ShutdownStatus, TlsError, TlsSettings, TransportBackend};

/// Backend that wraps the socket in a `StreamOwned` record stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBackend;

/// Server configuration for [`RecordBackend`], tickets included.
#[derive(Debug, Clone)]
pub struct RecordConfig {
    config: Arc<ServerConfig>,
    handshake_timeout: Duration,
}

impl TransportBackend for RecordBackend {
    type Context = RecordConfig;
    type Session = RecordSession;

    fn name(&self) -> &'static str {
        "record"
    }

    fn create_context(
        &self,
        certificate: &Certificate,
        settings: &TlsSettings,
    ) -> Result<Self::Context, TlsError> {
        let mut config = super::server_config(certificate, settings)?;
        config.ticketer = rustls::crypto::ring::Ticketer::new()
            .map_err(|e| TlsError::Allocation(format!("session tickets: {}", e)))?;

        Ok(RecordConfig {
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
        socket
            .set_read_timeout(Some(context.handshake_timeout))
            .map_err(|e| TlsError::Bind(e.to_string()))?;

        let mut stream = StreamOwned::new(conn, socket);
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(TlsError::handshake_io)?;
        }
        let _ = stream.sock.set_read_timeout(None);

        Ok(RecordSession { stream })
    }
}

/// A session whose handshake already completed inside `bind_session`.
pub struct RecordSession {
    stream: StreamOwned<ServerConnection, TcpStream>,
}

impl SecureSession for RecordSession {
    fn handshake(&mut self) -> Result<(), TlsError> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        plaintext::read_plaintext(&mut self.stream.conn, &self.stream.sock, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        let written = self.stream.write(buf)?;
        self.stream.flush()?;
        Ok(written)
    }

    fn pending_plaintext(&mut self) -> usize {
        plaintext::pending_plaintext(&mut self.stream.conn, &self.stream.sock)
    }

    fn shutdown(&mut self) -> ShutdownStatus {
        self.stream.conn.send_close_notify();
        match self.stream.flush() {
            Ok(()) => ShutdownStatus::Done,
            Err(e) => {
                tracing::debug!(error = %e, "Could not flush close notification");
                ShutdownStatus::Failed
            }
        }
    }

    fn alpn_protocol(&self) -> Option<&[u8]> {
        self.stream.conn.alpn_protocol()
    }
}
