//! The local node's identity: signing keys plus optional TLS material.

use meshchat_types::Fingerprint;

use crate::keys::{generate_keypair, NodeKeyPair, PublicKey};
use crate::sign::{sign_fingerprint, verify_fingerprint, Signature};
use crate::tls::TlsMaterial;
use crate::IdentityError;

/// Owned exclusively by the local node. Remote peers are only ever known by
/// their [`Fingerprint`] and, if they choose to share it, their [`PublicKey`].
#[derive(Debug)]
pub struct Identity {
    keys: NodeKeyPair,
    tls: Option<TlsMaterial>,
}

impl Identity {
    /// Fresh keys, no transport security.
    pub fn generate() -> Self {
        Self {
            keys: generate_keypair(),
            tls: None,
        }
    }

    pub fn with_keys(keys: NodeKeyPair) -> Self {
        Self { keys, tls: None }
    }

    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public()
    }

    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    pub fn sign(&self, fingerprint: &Fingerprint) -> Signature {
        sign_fingerprint(fingerprint, &self.keys)
    }

    /// Check a signature made by this identity.
    pub fn verify(&self, fingerprint: &Fingerprint, signature: &[u8]) -> Result<bool, IdentityError> {
        verify_fingerprint(fingerprint, signature, &self.keys.public())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;

    #[test]
    fn identity_verifies_its_own_signature() {
        let identity = Identity::with_keys(keypair_from_seed(&[3u8; 32]));
        let fp = Fingerprint::derive("10.0.0.1", "9000", "carol");
        let sig = identity.sign(&fp);
        assert!(identity.verify(&fp, &sig.0).unwrap());
        assert!(identity.tls().is_none());
    }

    #[test]
    fn malformed_signature_reports_reason() {
        let identity = Identity::generate();
        let fp = Fingerprint::derive("10.0.0.1", "9000", "carol");
        let err = identity.verify(&fp, b"short").unwrap_err();
        assert!(err.to_string().contains("malformed signature"));
    }
}
