//! Server subsystem.
//!
//! # Data Flow
//! ```text
//! SecureServer (secure.rs)
//!     setup_socket → context + listener
//!     create_connection(slot) → Connection::initialize
//!     teardown_socket → listener closed, context released
//!
//! ServeLoop (runner.rs)
//!     polls the listener and the ConnectionTable (table.rs)
//!     hands readable streams to a StreamHandler (responder.rs)
//! ```

pub mod responder;
pub mod runner;
pub mod secure;
pub mod table;

pub use responder::{Flow, StaticResponder, StreamHandler};
pub use runner::ServeLoop;
pub use secure::SecureServer;
pub use table::ConnectionTable;
