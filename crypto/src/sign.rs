//! Ed25519 signing and verification of node fingerprints.

use ed25519_dalek::{Signer, Verifier};
use meshchat_types::Fingerprint;

use crate::keys::{NodeKeyPair, PublicKey};
use crate::IdentityError;

/// A 64-byte Ed25519 signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Sign a fingerprint with the node's private key.
pub fn sign_fingerprint(fingerprint: &Fingerprint, keypair: &NodeKeyPair) -> Signature {
    let sig = keypair.signing_key().sign(fingerprint.as_str().as_bytes());
    Signature(sig.to_bytes())
}

/// Verify a signature over a fingerprint.
///
/// Returns `Ok(true)` for a valid signature, `Ok(false)` for a well-formed
/// signature that does not match, and an error with the reason when the
/// signature or key bytes are malformed. Never panics.
pub fn verify_fingerprint(
    fingerprint: &Fingerprint,
    signature: &[u8],
    public_key: &PublicKey,
) -> Result<bool, IdentityError> {
    let sig = ed25519_dalek::Signature::from_slice(signature)
        .map_err(|e| IdentityError::MalformedSignature(e.to_string()))?;
    let key = public_key.verifying_key()?;
    Ok(key.verify(fingerprint.as_str().as_bytes(), &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    fn fp(nick: &str) -> Fingerprint {
        Fingerprint::derive("127.0.0.1", "9000", nick)
    }

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let sig = sign_fingerprint(&fp("alice"), &kp);
        assert!(verify_fingerprint(&fp("alice"), &sig.0, &kp.public()).unwrap());
    }

    #[test]
    fn wrong_fingerprint_fails() {
        let kp = generate_keypair();
        let sig = sign_fingerprint(&fp("alice"), &kp);
        assert!(!verify_fingerprint(&fp("mallory"), &sig.0, &kp.public()).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = keypair_from_seed(&[1u8; 32]);
        let kp2 = keypair_from_seed(&[2u8; 32]);
        let sig = sign_fingerprint(&fp("alice"), &kp1);
        assert!(!verify_fingerprint(&fp("alice"), &sig.0, &kp2.public()).unwrap());
    }

    #[test]
    fn truncated_signature_is_an_error_not_a_panic() {
        let kp = generate_keypair();
        let sig = sign_fingerprint(&fp("alice"), &kp);
        let result = verify_fingerprint(&fp("alice"), &sig.0[..10], &kp.public());
        assert!(matches!(result, Err(IdentityError::MalformedSignature(_))));
    }

    #[test]
    fn signature_deterministic() {
        let kp = keypair_from_seed(&[99u8; 32]);
        assert_eq!(sign_fingerprint(&fp("a"), &kp), sign_fingerprint(&fp("a"), &kp));
    }
}
