//! Server-side TLS lifecycle: context, listening socket, connection slots.
//!
//! # Responsibilities
//! - Build the backend context once from the certificate
//! - Own the listening socket
//! - Create a connection per accepted client and run its initialization
//! - Release the listener, then the context, exactly once
//!
//! # Design Decisions
//! - Generic over the backend; the choice is made by the caller
//! - Sessions keep their own reference to the backend configuration, so
//!   connections stay usable after the context handle is released

use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::Arc;

use crate::config::ListenerConfig;
use crate::net::clock::{Clock, SystemClock};
use crate::net::connection::Connection;
use crate::net::headers::DefaultHeaders;
use crate::net::listener::Listener;
use crate::observability::metrics;
use crate::server::table::ConnectionTable;
use crate::tls::{Certificate, TlsError, TlsSettings, TransportBackend};

pub struct SecureServer<B: TransportBackend> {
    backend: B,
    certificate: Arc<Certificate>,
    listener_config: ListenerConfig,
    settings: TlsSettings,
    default_headers: Arc<DefaultHeaders>,
    clock: Arc<dyn Clock>,
    listener: Option<Listener>,
    context: Option<B::Context>,
    connections: ConnectionTable<B::Session>,
}

impl<B: TransportBackend> SecureServer<B> {
    pub fn new(
        backend: B,
        certificate: Arc<Certificate>,
        listener_config: ListenerConfig,
        settings: TlsSettings,
    ) -> Self {
        let connections = ConnectionTable::new(listener_config.max_connections);
        Self {
            backend,
            certificate,
            listener_config,
            settings,
            default_headers: Arc::new(DefaultHeaders::new()),
            clock: Arc::new(SystemClock),
            listener: None,
            context: None,
            connections,
        }
    }

    /// Headers passed to every connection this server creates.
    pub fn with_default_headers(mut self, headers: DefaultHeaders) -> Self {
        self.default_headers = Arc::new(headers);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some() && self.context.is_some()
    }

    /// Build the context and bind the listening socket.
    ///
    /// Returns true if the server is running afterwards. Calling it again
    /// while running changes nothing.
    pub fn setup_socket(&mut self) -> bool {
        if self.is_running() {
            return true;
        }

        let context = match self
            .backend
            .create_context(&self.certificate, &self.settings)
        {
            Ok(context) => context,
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "Could not create TLS context");
                return false;
            }
        };

        match Listener::bind(&self.listener_config) {
            Ok(listener) => {
                tracing::info!(
                    backend = self.backend.name(),
                    address = ?listener.local_addr().ok(),
                    max_connections = self.connections.capacity(),
                    alpn = ?self.settings.alpn,
                    "TLS server listening"
                );
                self.listener = Some(listener);
                self.context = Some(context);
                true
            }
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    bind_address = %self.listener_config.bind_address,
                    port = self.listener_config.port,
                    error = %e,
                    "Could not set up listening socket"
                );
                self.backend.destroy_context(context);
                false
            }
        }
    }

    /// Close the listener, then release the context.
    pub fn teardown_socket(&mut self) {
        if let Some(listener) = self.listener.take() {
            drop(listener);
            tracing::debug!(backend = self.backend.name(), "Listener closed");
        }
        if let Some(context) = self.context.take() {
            self.backend.destroy_context(context);
            tracing::info!(backend = self.backend.name(), "TLS context released");
        }
    }

    /// Accept a client into `slot` and complete its handshake.
    ///
    /// Blocks in accept unless [`poll_ready`](Self::poll_ready) returned
    /// true. A failed connection is already torn down and its slot freed.
    pub fn create_connection(&mut self, slot: usize) -> Result<RawFd, TlsError> {
        let (Some(listener), Some(context)) = (self.listener.as_ref(), self.context.as_ref())
        else {
            return Err(TlsError::InvalidState("server is not running"));
        };

        let connection = self.connections.insert(
            slot,
            Connection::with_clock(self.settings.shutdown_timeout, Arc::clone(&self.clock)),
        )?;
        let result = connection.initialize(
            listener,
            &self.backend,
            context,
            Arc::clone(&self.default_headers),
        );

        if result.is_err() {
            self.connections.remove(slot);
        }
        metrics::set_active_connections(self.connections.len());
        result
    }

    /// True when a client is waiting to be accepted.
    pub fn poll_ready(&self) -> bool {
        match self.listener.as_ref().map(Listener::poll_ready) {
            Some(Ok(ready)) => ready,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Listener readiness check failed");
                false
            }
            None => false,
        }
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.connections.free_slot()
    }

    /// Drop the connection in `slot`, running its teardown.
    pub fn release_slot(&mut self, slot: usize) {
        if self.connections.remove(slot).is_some() {
            metrics::set_active_connections(self.connections.len());
        }
    }

    pub fn connections(&self) -> &ConnectionTable<B::Session> {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut ConnectionTable<B::Session> {
        &mut self.connections
    }

    pub fn connection(&self, slot: usize) -> Option<&Connection<B::Session>> {
        self.connections.get(slot)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn settings(&self) -> &TlsSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl<B: TransportBackend> Drop for SecureServer<B> {
    fn drop(&mut self) {
        self.teardown_socket();
    }
}
