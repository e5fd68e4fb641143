//! TLS termination core for an embedded HTTP server.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;
pub mod tls;

pub use config::TerminatorConfig;
pub use lifecycle::Shutdown;
pub use net::{ByteStream, Closure, Connection, ConnectionState};
pub use server::{SecureServer, ServeLoop};
pub use tls::{Certificate, RecordBackend, SessionBackend, TlsError, TransportBackend};
