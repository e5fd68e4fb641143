//! Cooperative serve loop.
//!
//! # Data Flow
//! ```text
//! tick:
//!     listener ready + free slot → create_connection (accept + handshake)
//!     Established + readable      → handler.on_readable
//!     Established + idle too long → close_connection
//!     Closing / Error             → close_connection (drives shutdown)
//!     Closed                      → slot freed
//! ```
//!
//! # Design Decisions
//! - Single thread, no locking; the loop sleeps only when a tick did nothing
//! - On stop, no new clients are accepted and every connection is closed;
//!   draining is bounded by the shutdown window

use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::lifecycle::shutdown::is_signalled;
use crate::net::connection::{ByteStream, ConnectionState};
use crate::observability::metrics;
use crate::server::responder::{Flow, StreamHandler};
use crate::server::secure::SecureServer;
use crate::tls::{TlsError, TransportBackend};

pub struct ServeLoop<B: TransportBackend, H: StreamHandler> {
    server: SecureServer<B>,
    handler: H,
    poll_interval: Duration,
    idle_timeout: Duration,
}

impl<B: TransportBackend, H: StreamHandler> ServeLoop<B, H> {
    pub fn new(server: SecureServer<B>, handler: H, config: &ServerConfig) -> Self {
        Self {
            server,
            handler,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }

    pub fn server(&self) -> &SecureServer<B> {
        &self.server
    }

    /// Serve until `stop` fires, then drain and tear down.
    pub fn run(&mut self, mut stop: broadcast::Receiver<()>) -> Result<(), TlsError> {
        if !self.server.setup_socket() {
            return Err(TlsError::InvalidState("listening socket could not be set up"));
        }

        while !is_signalled(&mut stop) {
            if !self.tick() {
                std::thread::sleep(self.poll_interval);
            }
        }

        self.drain();
        self.server.teardown_socket();
        tracing::info!(backend = self.server.backend_name(), "Serve loop stopped");
        Ok(())
    }

    /// One pass over the listener and every slot. Returns true if anything
    /// happened.
    pub fn tick(&mut self) -> bool {
        let mut busy = false;

        if let Some(slot) = self.server.free_slot() {
            if self.server.poll_ready() {
                busy = true;
                if let Ok(fd) = self.server.create_connection(slot) {
                    tracing::debug!(slot, fd, "Connection slot filled");
                }
            }
        }

        let idle_timeout = self.idle_timeout;
        let handler = &mut self.handler;
        for (slot, conn) in self.server.connections_mut().iter_mut() {
            match conn.state() {
                ConnectionState::Established => {
                    if conn.can_read_data() {
                        busy = true;
                        let headers = conn.default_headers().cloned().unwrap_or_default();
                        if handler.on_readable(conn.id(), conn, &headers) == Flow::Close {
                            conn.close_connection();
                        }
                    } else if conn.idle_for() >= idle_timeout {
                        tracing::info!(connection_id = %conn.id(), slot, "Closing idle connection");
                        conn.close_connection();
                    }
                }
                ConnectionState::Closing | ConnectionState::Error => conn.close_connection(),
                ConnectionState::Undefined | ConnectionState::Closed(_) => {}
            }
        }

        self.reap();
        busy
    }

    fn drain(&mut self) {
        let active = self.server.connections().len();
        if active > 0 {
            tracing::info!(active, "Draining connections");
        }

        loop {
            let mut open = 0;
            for (_, conn) in self.server.connections_mut().iter_mut() {
                conn.close_connection();
                if !conn.is_closed() {
                    open += 1;
                }
            }
            self.reap();
            if open == 0 {
                break;
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn reap(&mut self) {
        let handler = &mut self.handler;
        for (_, conn) in self.server.connections_mut().iter_mut() {
            if conn.is_closed() {
                handler.on_closed(conn.id());
            }
        }
        if self.server.connections_mut().reap_closed() > 0 {
            metrics::set_active_connections(self.server.connections().len());
        }
    }
}
