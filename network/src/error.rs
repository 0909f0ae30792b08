use meshchat_types::Fingerprint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("peer {0} not found")]
    NoSuchPeer(Fingerprint),

    #[error("write to {peer} failed: {reason}")]
    WriteFailed { peer: Fingerprint, reason: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] meshchat_protocol::ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
