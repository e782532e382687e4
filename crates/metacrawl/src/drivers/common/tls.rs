//! rustls connector for PostgreSQL sources, picked by the datasource's `ssl_mode`.
//!
//! | ssl_mode | behavior |
//! |---|---|
//! | `disable` (or empty) | plain TCP |
//! | `require` | encrypted, server certificate not checked |
//! | `verify-ca`, `verify-full` | webpki roots; rustls always checks the hostname |

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::warn;

use crate::error::{CrawlError, Result};

/// Build the connector for `ssl_mode`, or `None` for plain TCP.
pub fn postgres_tls(ssl_mode: &str) -> Result<Option<MakeRustlsConnect>> {
    let provider = Arc::new(ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| CrawlError::Config(format!("TLS setup failed: {}", e)))?;

    let config = match ssl_mode.trim().to_lowercase().as_str() {
        "" | "disable" => return Ok(None),
        "require" => {
            warn!("ssl_mode=require skips certificate verification; prefer verify-full");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(UncheckedServerCert(provider)))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        other => {
            return Err(CrawlError::Config(format!(
                "Invalid ssl_mode '{}'. Valid values: disable, require, verify-ca, verify-full",
                other
            )))
        }
    };

    Ok(Some(MakeRustlsConnect::new(config)))
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct UncheckedServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for UncheckedServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_means_plain_tcp() {
        assert!(postgres_tls("disable").unwrap().is_none());
        assert!(postgres_tls("").unwrap().is_none());
    }

    #[test]
    fn test_encrypted_modes_build_connector() {
        assert!(postgres_tls("REQUIRE").unwrap().is_some());
        assert!(postgres_tls("verify-full").unwrap().is_some());
    }

    #[test]
    fn test_unknown_mode_is_config_error() {
        let err = postgres_tls("prefer-maybe").err().expect("expected an error");
        assert!(matches!(err, CrawlError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
