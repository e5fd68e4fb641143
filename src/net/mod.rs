//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (readiness probe, accept)
//!     → connection.rs (TLS bind + handshake through a backend session)
//!     → ByteStream handed to the HTTP layer
//!
//! Connection States:
//!     Undefined → Established → Closing → Closed(Clean | Forced | Aborted)
//!                      ↘ Error ↗
//! ```
//!
//! # Design Decisions
//! - Everything here is synchronous; the serve loop polls
//! - A connection without a session does plain socket I/O
//! - Time comes from an injectable clock so deadlines are testable

pub mod clock;
pub mod connection;
pub mod headers;
pub mod listener;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{ByteStream, Closure, Connection, ConnectionId, ConnectionState};
pub use headers::DefaultHeaders;
pub use listener::{Listener, ListenerError};
