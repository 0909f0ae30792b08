//! Errors raised while building or parsing the fundamental types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid node address: {0}")]
    InvalidAddress(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}
