//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, slots available)
//! - Check ALPN identifiers fit the wire encoding
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TerminatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use crate::config::schema::TerminatorConfig;

/// Longest ALPN protocol identifier the wire format can carry.
const MAX_ALPN_LEN: usize = 255;

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &TerminatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not an IP address", config.listener.bind_address),
        ));
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "at least one connection slot is required",
        ));
    }

    if config.tls.cert_path.is_empty() {
        errors.push(ValidationError::new("tls.cert_path", "is required"));
    }
    if config.tls.key_path.is_empty() {
        errors.push(ValidationError::new("tls.key_path", "is required"));
    }
    if config.tls.shutdown_timeout_ms == 0 {
        errors.push(ValidationError::new("tls.shutdown_timeout_ms", "must be non-zero"));
    }
    if config.tls.handshake_timeout_ms == 0 {
        errors.push(ValidationError::new("tls.handshake_timeout_ms", "must be non-zero"));
    }
    for protocol in &config.tls.alpn {
        if protocol.is_empty() {
            errors.push(ValidationError::new("tls.alpn", "empty protocol identifier"));
        } else if protocol.len() > MAX_ALPN_LEN {
            errors.push(ValidationError::new(
                "tls.alpn",
                format!(
                    "'{}...' exceeds {} bytes",
                    protocol.chars().take(16).collect::<String>(),
                    MAX_ALPN_LEN
                ),
            ));
        }
    }

    if config.server.poll_interval_ms == 0 {
        errors.push(ValidationError::new("server.poll_interval_ms", "must be non-zero"));
    }
    if config.server.idle_timeout_secs == 0 {
        errors.push(ValidationError::new("server.idle_timeout_secs", "must be non-zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
