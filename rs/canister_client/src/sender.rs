//! Identities on whose behalf requests are sent.

use crate::error::{AgentError, AgentResult};
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer, SigningKey};
use ic_principal::Principal;
use rand::Rng;
use std::fmt;

/// ASN.1 DER prefix of an Ed25519 public key in a `SubjectPublicKeyInfo`.
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Wraps a raw Ed25519 public key in its DER encoding.
pub fn ed25519_public_key_to_der(public_key: &[u8; 32]) -> Vec<u8> {
    let mut der = Vec::with_capacity(ED25519_DER_PREFIX.len() + public_key.len());
    der.extend_from_slice(&ED25519_DER_PREFIX);
    der.extend_from_slice(public_key);
    der
}

/// The signing boundary: who sends a request and how it is authenticated.
///
/// The message handed to [`Identity::sign`] is always the request id
/// prefixed with the `ic-request` domain separator.
pub trait Identity: Send + Sync {
    fn sender(&self) -> Principal;

    /// DER-encoded public key, `None` for unauthenticated senders.
    fn public_key(&self) -> Option<Vec<u8>>;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, String>;
}

/// The anonymous sender. Requests are sent without key or signature.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn sender(&self) -> Principal {
        Principal::anonymous()
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        None
    }

    fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, String> {
        Ok(vec![])
    }
}

/// A sender holding an Ed25519 key pair. Its principal is the
/// self-authenticating principal of the public key.
#[derive(Clone)]
pub struct BasicIdentity {
    signing_key: SigningKey,
    public_key_der: Vec<u8>,
}

impl BasicIdentity {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key_der = ed25519_public_key_to_der(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            public_key_der,
        }
    }

    pub fn from_secret_key_bytes(secret_key: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret_key))
    }

    /// Reads a PKCS#8 PEM-encoded Ed25519 private key.
    pub fn from_pem(pem: &str) -> AgentResult<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| AgentError::Config(format!("failed to read Ed25519 key: {}", e)))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// A fresh random key pair.
    pub fn generate() -> Self {
        let secret_key: [u8; 32] = rand::thread_rng().gen();
        Self::from_secret_key_bytes(&secret_key)
    }
}

impl fmt::Debug for BasicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicIdentity")
            .field("sender", &self.sender().to_text())
            .finish()
    }
}

impl Identity for BasicIdentity {
    fn sender(&self) -> Principal {
        Principal::self_authenticating(&self.public_key_der)
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.public_key_der.clone())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, String> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
    use ed25519_dalek::pkcs8::EncodePrivateKey;
    use ed25519_dalek::{Signature, Verifier};

    #[test]
    fn anonymous_identity_has_no_key() {
        let identity = AnonymousIdentity;
        assert_eq!(identity.sender(), Principal::anonymous());
        assert_eq!(identity.public_key(), None);
    }

    #[test]
    fn basic_identity_signs_verifiably() {
        let identity = BasicIdentity::from_secret_key_bytes(&[7; 32]);
        let signature = identity.sign(b"\x0Aic-request message").unwrap();

        let signature = Signature::from_slice(&signature).unwrap();
        identity
            .signing_key
            .verifying_key()
            .verify(b"\x0Aic-request message", &signature)
            .unwrap();
    }

    #[test]
    fn basic_identity_sender_is_self_authenticating() {
        let identity = BasicIdentity::from_secret_key_bytes(&[7; 32]);
        let der = identity.public_key().unwrap();
        assert_eq!(der.len(), 44);
        assert_eq!(hex::encode(&der[..12]), "302a300506032b6570032100");

        let sender = identity.sender();
        assert_eq!(sender, Principal::self_authenticating(&der));
        // Self-authenticating principals end with 0x02.
        assert_eq!(sender.as_slice().last(), Some(&0x02));
    }

    #[test]
    fn basic_identity_reads_pkcs8_pem() {
        let signing_key = SigningKey::from_bytes(&[9; 32]);
        let pem = signing_key.to_pkcs8_pem(LineEnding::LF).unwrap();

        let identity = BasicIdentity::from_pem(&pem).unwrap();
        assert_eq!(
            identity.sender(),
            BasicIdentity::from_signing_key(signing_key).sender()
        );
        assert!(BasicIdentity::from_pem("not a pem").is_err());
    }

    #[test]
    fn generated_identities_differ() {
        assert_ne!(
            BasicIdentity::generate().sender(),
            BasicIdentity::generate().sender()
        );
    }
}
