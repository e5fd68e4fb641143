//! Listening socket with a readiness probe.
//!
//! # Responsibilities
//! - Bind to the configured address and port
//! - Tell the poll loop whether a client is waiting, without blocking
//! - Hand accepted sockets to connection initialization
//!
//! # Design Decisions
//! - The socket stays non-blocking between calls; `poll_ready` accepts one
//!   client early and parks it so the following `accept` cannot block
//! - `accept` without a parked client blocks until a peer connects

use std::cell::RefCell;
use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A TCP listener driven by a cooperative poll loop.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    /// Client accepted by `poll_ready` and not yet claimed.
    parked: RefCell<Option<(TcpStream, SocketAddr)>>,
}

impl Listener {
    /// Bind to the configured address.
    pub fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let ip: IpAddr = config
            .bind_address
            .parse()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        Self::bind_addr(SocketAddr::new(ip, config.port))
    }

    pub fn bind_addr(addr: SocketAddr) -> Result<Self, ListenerError> {
        let inner = TcpListener::bind(addr).map_err(ListenerError::Bind)?;
        inner.set_nonblocking(true).map_err(ListenerError::Bind)?;

        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner,
            parked: RefCell::new(None),
        })
    }

    /// Check whether a client is waiting. Never blocks.
    pub fn poll_ready(&self) -> Result<bool, ListenerError> {
        if self.parked.borrow().is_some() {
            return Ok(true);
        }
        match self.inner.accept() {
            Ok(client) => {
                *self.parked.borrow_mut() = Some(client);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(ListenerError::Accept(e)),
        }
    }

    /// Accept a connection.
    ///
    /// Blocks until a peer connects unless `poll_ready` returned true first.
    /// The returned socket is in blocking mode.
    pub fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = match self.parked.borrow_mut().take() {
            Some(client) => client,
            None => {
                self.inner.set_nonblocking(false)?;
                let accepted = self.inner.accept();
                self.inner.set_nonblocking(true)?;
                accepted?
            }
        };
        stream.set_nonblocking(false)?;

        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
