//! TLS backend subsystem.
//!
//! # Data Flow
//! ```text
//! Certificate (DER cert + key)
//!     → backend.create_context() (once per server)
//!     → backend.bind_session(context, accepted socket)
//!     → session.handshake()
//!     → session.read()/write()/pending_plaintext()
//!     → session.shutdown() (polled until Done, or forced by the connection)
//! ```
//!
//! # Design Decisions
//! - Backend is a type parameter chosen once when the server is composed
//! - Two backends with different shapes share one contract:
//!   `SessionBackend` drives handshake and shutdown as separate calls,
//!   `RecordBackend` handshakes eagerly inside `bind_session`
//! - Reads after the handshake pull from the socket at most once and never
//!   wait; a partial record reports `WouldBlock`
//! - Sessions are destroyed by dropping them; the owning connection keeps
//!   them in an `Option` so destruction happens exactly once

pub mod backend;
pub mod certificate;
pub mod error;
mod plaintext;
pub mod record;
pub mod session;

pub use backend::{SecureSession, ShutdownStatus, TlsSettings, TransportBackend};
pub use certificate::{Certificate, CertificateError};
pub use error::TlsError;
pub use record::RecordBackend;
pub use session::SessionBackend;

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{NoServerSessionStorage, ServerSessionMemoryCache};
use rustls::ServerConfig;

/// Build the rustls server configuration shared by both backends.
///
/// The certificate and key are taken as DER and handed to rustls unchanged.
pub(crate) fn server_config(
    certificate: &Certificate,
    settings: &TlsSettings,
) -> Result<ServerConfig, TlsError> {
    let cert_chain = vec![CertificateDer::from(certificate.certificate().to_vec())];
    let key = PrivateKeyDer::try_from(certificate.private_key().to_vec())
        .map_err(|e| TlsError::Allocation(format!("unusable private key: {}", e)))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TlsError::Allocation(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(cert_chain, key)
    .map_err(|e| TlsError::Allocation(format!("certificate rejected: {}", e)))?;

    config.alpn_protocols = settings
        .alpn
        .iter()
        .map(|protocol| protocol.as_bytes().to_vec())
        .collect();

    if settings.session_cache_size == 0 {
        config.session_storage = Arc::new(NoServerSessionStorage {});
    } else {
        config.session_storage = ServerSessionMemoryCache::new(settings.session_cache_size);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> Certificate {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        Certificate::new(cert.der().to_vec(), key_pair.serialize_der())
    }

    #[test]
    fn server_config_carries_alpn_list() {
        let settings = TlsSettings {
            alpn: vec!["h2".into(), "http/1.1".into()],
            ..TlsSettings::default()
        };
        let config = server_config(&self_signed(), &settings).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn garbage_key_is_an_allocation_error() {
        let good = self_signed();
        let broken = Certificate::new(good.certificate().to_vec(), b"not a key".to_vec());
        let err = server_config(&broken, &TlsSettings::default()).unwrap_err();
        assert!(matches!(err, TlsError::Allocation(_)), "got {:?}", err);
    }
}
