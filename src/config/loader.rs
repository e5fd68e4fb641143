//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::TerminatorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<TerminatorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<TerminatorConfig, ConfigError> {
    let config: TerminatorConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;

    #[test]
    fn parses_full_document() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1"
            port = 8443
            max_connections = 16

            [tls]
            cert_path = "/etc/tls/cert.pem"
            key_path = "/etc/tls/key.pem"
            backend = "record"
            alpn = ["h2", "http/1.1"]
            shutdown_timeout_ms = 1500

            [server.default_headers]
            Server = "edge"
            Strict-Transport-Security = "max-age=31536000"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 8443);
        assert_eq!(config.tls.backend, BackendKind::Record);
        assert_eq!(config.tls.alpn, vec!["h2", "http/1.1"]);
        assert_eq!(config.tls.shutdown_timeout_ms, 1500);
        assert_eq!(config.tls.handshake_timeout_ms, 5000);
        assert_eq!(config.server.default_headers.len(), 2);
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = parse_config("").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("tls.cert_path: is required"));
        assert!(message.contains("tls.key_path: is required"));
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let err = parse_config("[tls]\nbackend = \"openssl\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/terminator.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
