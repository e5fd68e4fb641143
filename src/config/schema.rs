//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the terminator.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the TLS terminator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TerminatorConfig {
    /// Listener configuration (bind address, port, connection slots).
    pub listener: ListenerConfig,

    /// Certificate, backend choice and handshake/shutdown windows.
    pub tls: TlsConfig,

    /// Poll loop and response settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0").
    pub bind_address: String,

    /// TCP port.
    pub port: u16,

    /// Connection slots in the server table.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 443,
            max_connections: 4,
        }
    }
}

/// Which TLS implementation terminates connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Session object driven over the raw socket; handshake is an explicit step.
    #[default]
    Session,
    /// Record stream that handshakes while binding the session.
    Record,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Session => "session",
            BackendKind::Record => "record",
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,

    pub backend: BackendKind,

    /// ALPN identifiers, in preference order.
    pub alpn: Vec<String>,

    /// How long a closing connection waits for the client's close notification.
    pub shutdown_timeout_ms: u64,

    /// Upper bound on a single handshake.
    pub handshake_timeout_ms: u64,

    /// Server-side session cache entries (0 disables resumption state).
    pub session_cache_size: usize,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: String::new(),
            key_path: String::new(),
            backend: BackendKind::default(),
            alpn: vec!["http/1.1".to_string()],
            shutdown_timeout_ms: 3000,
            handshake_timeout_ms: 5000,
            session_cache_size: 256,
        }
    }
}

/// Poll loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Headers added to every response.
    pub default_headers: BTreeMap<String, String>,

    /// Sleep between poll ticks when nothing happened.
    pub poll_interval_ms: u64,

    /// Close connections with no traffic for this long.
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("Server".to_string(), "tls-terminator".to_string());
        Self {
            default_headers,
            poll_interval_ms: 10,
            idle_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: TerminatorConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.port, 443);
        assert_eq!(config.listener.max_connections, 4);
        assert_eq!(config.tls.backend, BackendKind::Session);
        assert_eq!(config.tls.shutdown_timeout_ms, 3000);
        assert_eq!(config.tls.alpn, vec!["http/1.1".to_string()]);
    }

    #[test]
    fn backend_names_are_lowercase() {
        let config: TerminatorConfig = toml::from_str(
            r#"
            [tls]
            backend = "record"
            "#,
        )
        .unwrap();
        assert_eq!(config.tls.backend, BackendKind::Record);
        assert_eq!(config.tls.backend.as_str(), "record");
    }
}
