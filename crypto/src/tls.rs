//! TLS material for node-to-node transports.
//!
//! Every node presents a self-signed certificate. Certificates are generated
//! on first start and loaded from `cert.pem` / `key.pem` afterwards. Clients
//! accept any server certificate (there is no shared CA between peers) but
//! still check the handshake signatures; peer identity is the business of the
//! fingerprint layer, not of X.509.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rcgen::{CertificateParams, DnType, KeyPair};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, ServerConfig, SignatureScheme};
use tracing::info;

use crate::IdentityError;

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";

/// A loaded certificate chain and its private key.
pub struct TlsMaterial {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsMaterial {
    /// Generate `cert.pem`/`key.pem` in `dir` if either is missing, then load them.
    pub fn load_or_generate(dir: &Path, hostname: &str) -> Result<Self, IdentityError> {
        let (cert_path, key_path) = paths(dir);
        if !cert_path.exists() || !key_path.exists() {
            info!(hostname, dir = %dir.display(), "generating self-signed TLS certificate");
            generate_self_signed(&cert_path, &key_path, hostname)?;
        }
        Self::load(&cert_path, &key_path)
    }

    /// Load PEM-encoded certificate chain and key.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, IdentityError> {
        let cert_pem = std::fs::read(cert_path)?;
        let key_pem = std::fs::read(key_path)?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, IdentityError> {
        let certs: Vec<_> = rustls_pemfile::certs(&mut &cert_pem[..]).collect::<Result<_, _>>()?;
        if certs.is_empty() {
            return Err(IdentityError::Tls("no certificate found in PEM".into()));
        }
        let key = rustls_pemfile::private_key(&mut &key_pem[..])?
            .ok_or_else(|| IdentityError::Tls("no private key found in PEM".into()))?;
        Ok(Self { certs, key })
    }

    /// Server side configuration presenting this certificate.
    pub fn server_config(&self) -> Result<ServerConfig, IdentityError> {
        let config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(self.certs.clone(), self.key.clone_key())?;
        Ok(config)
    }

    /// Client side configuration accepting self-signed peer certificates.
    pub fn client_config(&self) -> Result<ClientConfig, IdentityError> {
        let provider = provider();
        let verifier = AcceptSelfSigned {
            algorithms: provider.signature_verification_algorithms,
        };
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();
        Ok(config)
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("certs", &self.certs.len())
            .finish_non_exhaustive()
    }
}

fn paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(CERT_FILE), dir.join(KEY_FILE))
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn generate_self_signed(cert_path: &Path, key_path: &Path, hostname: &str) -> Result<(), IdentityError> {
    let host = hostname.trim().trim_start_matches('[').trim_end_matches(']');
    let key_pair = KeyPair::generate()?;

    let mut params = CertificateParams::new(vec![host.to_string(), "localhost".to_string()])?;
    params.distinguished_name.push(DnType::OrganizationName, "meshchat");
    params.distinguished_name.push(DnType::CommonName, host);

    let cert = params.self_signed(&key_pair)?;

    if let Some(parent) = cert_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(cert_path, cert.pem())?;
    std::fs::write(key_path, key_pair.serialize_pem())?;

    info!(cert = %cert_path.display(), key = %key_path.display(), "TLS material written");
    Ok(())
}

#[derive(Debug)]
struct AcceptSelfSigned {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptSelfSigned {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
