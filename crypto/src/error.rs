use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("malformed public key: {0}")]
    MalformedPublicKey(String),

    #[error("no signing key available")]
    MissingKey,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("certificate generation failed: {0}")]
    CertGeneration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rustls::Error> for IdentityError {
    fn from(e: rustls::Error) -> Self {
        Self::Tls(e.to_string())
    }
}

impl From<rcgen::Error> for IdentityError {
    fn from(e: rcgen::Error) -> Self {
        Self::CertGeneration(e.to_string())
    }
}
