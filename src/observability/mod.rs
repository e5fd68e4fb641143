//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connections and the serve loop produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`connection_id`, `fd`, `peer_addr`, `backend`) on
//!   every connection event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
