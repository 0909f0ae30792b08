//! Cryptographic material for meshchat nodes.
//!
//! - **Ed25519** keypairs for the optional signing of node fingerprints
//! - **TLS** certificate generation/loading and rustls client/server configs

pub mod error;
pub mod identity;
pub mod keys;
pub mod sign;
pub mod tls;

pub use error::IdentityError;
pub use identity::Identity;
pub use keys::{generate_keypair, keypair_from_seed, NodeKeyPair, PublicKey};
pub use sign::{sign_fingerprint, verify_fingerprint, Signature};
pub use tls::TlsMaterial;
