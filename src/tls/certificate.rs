//! Certificate material.
//!
//! The server consumes DER buffers as-is. `from_pem_files` is a convenience
//! for the binary; nothing in the connection path parses certificates.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zeroize::Zeroizing;

/// Errors raised while reading certificate files.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {0:?}")]
    NoCertificate(PathBuf),

    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),
}

/// Immutable certificate and private key, both DER encoded.
#[derive(Clone)]
pub struct Certificate {
    certificate: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
}

impl Certificate {
    pub fn new(certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            certificate,
            private_key: Zeroizing::new(private_key),
        }
    }

    /// Load the first certificate and private key from PEM files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, CertificateError> {
        let mut reader = open(cert_path)?;
        let certificate = match rustls_pemfile::certs(&mut reader).next() {
            Some(Ok(cert)) => cert.as_ref().to_vec(),
            Some(Err(source)) => {
                return Err(CertificateError::Io {
                    path: cert_path.to_path_buf(),
                    source,
                })
            }
            None => return Err(CertificateError::NoCertificate(cert_path.to_path_buf())),
        };

        let mut reader = open(key_path)?;
        let key = rustls_pemfile::private_key(&mut reader)
            .map_err(|source| CertificateError::Io {
                path: key_path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| CertificateError::NoPrivateKey(key_path.to_path_buf()))?;

        Ok(Self::new(certificate, key.secret_der().to_vec()))
    }

    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    pub fn certificate_len(&self) -> usize {
        self.certificate.len()
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn private_key_len(&self) -> usize {
        self.private_key.len()
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn open(path: &Path) -> Result<BufReader<File>, CertificateError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tls-terminator-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn debug_output_hides_key() {
        let cert = Certificate::new(vec![1, 2, 3], vec![0xAA; 16]);
        let rendered = format!("{:?}", cert);
        assert!(rendered.contains("certificate_len: 3"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("170"));
    }

    #[test]
    fn loads_pem_pair() {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        let dir = scratch_dir("pem-pair");
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

        let loaded = Certificate::from_pem_files(&cert_path, &key_path).unwrap();
        assert_eq!(loaded.certificate(), cert.der().as_ref());
        assert_eq!(loaded.private_key(), key_pair.serialize_der().as_slice());
    }

    #[test]
    fn missing_file_reports_path() {
        let missing = Path::new("/nonexistent/cert.pem");
        let err = Certificate::from_pem_files(missing, missing).unwrap_err();
        assert!(matches!(err, CertificateError::Io { ref path, .. } if path == missing));
    }

    #[test]
    fn key_file_without_key_is_rejected() {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        let dir = scratch_dir("no-key");
        let cert_path = dir.join("cert.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();

        let err = Certificate::from_pem_files(&cert_path, &cert_path).unwrap_err();
        assert!(matches!(err, CertificateError::NoPrivateKey(_)));
    }
}
