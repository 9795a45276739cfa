//! BLS12-381 signature verification as used for certified state: signatures
//! are compressed G1 points, public keys compressed G2 points.

use crate::error::{CertificateError, CertificateResult};
use ic_bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use ic_bls12_381::{pairing, G1Affine, G1Projective, G2Affine};

/// Domain separation tag of the hash-to-curve step.
pub const BLS_SIGNATURE_DOMAIN_SEP: &[u8; 43] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// Size of a compressed public key.
pub const PUBLIC_KEY_SIZE: usize = 96;

/// Size of a compressed signature.
pub const SIGNATURE_SIZE: usize = 48;

/// ASN.1 DER prefix of a BLS12-381 public key in a `SubjectPublicKeyInfo`.
pub const DER_PREFIX: [u8; 37] = [
    0x30, 0x81, 0x82, 0x30, 0x1d, 0x06, 0x0d, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0xdc, 0x7c, 0x05,
    0x03, 0x01, 0x02, 0x01, 0x06, 0x0c, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0xdc, 0x7c, 0x05, 0x03,
    0x02, 0x01, 0x03, 0x61, 0x00,
];

/// Total size of a DER-encoded public key.
pub const DER_KEY_SIZE: usize = DER_PREFIX.len() + PUBLIC_KEY_SIZE;

/// Extracts the raw 96-byte key from its DER encoding.
pub fn public_key_from_der(der: &[u8]) -> CertificateResult<[u8; PUBLIC_KEY_SIZE]> {
    if der.len() != DER_KEY_SIZE {
        return Err(CertificateError::MalformedPublicKey(format!(
            "DER-encoded key must be {} bytes long, got {} bytes",
            DER_KEY_SIZE,
            der.len()
        )));
    }
    let (prefix, key) = der.split_at(DER_PREFIX.len());
    if prefix != DER_PREFIX {
        return Err(CertificateError::MalformedPublicKey(format!(
            "expected DER prefix {}, got {}",
            hex::encode(DER_PREFIX),
            hex::encode(prefix)
        )));
    }
    let mut raw = [0; PUBLIC_KEY_SIZE];
    raw.copy_from_slice(key);
    Ok(raw)
}

/// Wraps a raw 96-byte key in its DER encoding.
pub fn public_key_to_der(key: &[u8; PUBLIC_KEY_SIZE]) -> Vec<u8> {
    let mut der = Vec::with_capacity(DER_KEY_SIZE);
    der.extend_from_slice(&DER_PREFIX);
    der.extend_from_slice(key);
    der
}

/// Hashes `msg` to a point of G1.
pub fn hash_to_g1(msg: &[u8]) -> G1Affine {
    let point = <G1Projective as HashToCurve<ExpandMsgXmd<sha2::Sha256>>>::hash_to_curve(
        msg,
        BLS_SIGNATURE_DOMAIN_SEP,
    );
    G1Affine::from(point)
}

/// Verifies `signature` over `msg` under the raw public key `key`.
pub fn verify(signature: &[u8], msg: &[u8], key: &[u8]) -> CertificateResult<()> {
    let key: [u8; PUBLIC_KEY_SIZE] = key.try_into().map_err(|_| {
        CertificateError::MalformedPublicKey(format!(
            "public key must be {} bytes long, got {} bytes",
            PUBLIC_KEY_SIZE,
            key.len()
        ))
    })?;
    let key = Option::<G2Affine>::from(G2Affine::from_compressed(&key)).ok_or_else(|| {
        CertificateError::MalformedPublicKey("not a point of G2".to_string())
    })?;
    if bool::from(key.is_identity()) {
        return Err(CertificateError::MalformedPublicKey(
            "public key is the identity of G2".to_string(),
        ));
    }

    let signature: [u8; SIGNATURE_SIZE] = signature.try_into().map_err(|_| {
        CertificateError::InvalidSignature(format!(
            "signature must be {} bytes long, got {} bytes",
            SIGNATURE_SIZE,
            signature.len()
        ))
    })?;
    let signature = Option::<G1Affine>::from(G1Affine::from_compressed(&signature))
        .ok_or_else(|| CertificateError::InvalidSignature("not a point of G1".to_string()))?;
    if bool::from(signature.is_identity()) {
        return Err(CertificateError::InvalidSignature(
            "signature is the identity of G1".to_string(),
        ));
    }

    let msg = hash_to_g1(msg);
    if pairing(&signature, &G2Affine::generator()) == pairing(&msg, &key) {
        Ok(())
    } else {
        Err(CertificateError::InvalidSignature(
            "signature does not match the message".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ic_bls12_381::Scalar;

    fn key_pair(seed: u64) -> (Scalar, [u8; PUBLIC_KEY_SIZE]) {
        let secret = Scalar::from(seed);
        let public = G2Affine::from(G2Affine::generator() * secret);
        (secret, public.to_compressed())
    }

    fn sign(secret: &Scalar, msg: &[u8]) -> [u8; SIGNATURE_SIZE] {
        G1Affine::from(hash_to_g1(msg) * secret).to_compressed()
    }

    #[test]
    fn verifies_valid_signature() {
        let (secret, public) = key_pair(42);
        let signature = sign(&secret, b"message");
        assert_eq!(verify(&signature, b"message", &public), Ok(()));
    }

    #[test]
    fn rejects_signature_over_other_message() {
        let (secret, public) = key_pair(42);
        let signature = sign(&secret, b"message");
        assert_matches!(
            verify(&signature, b"other message", &public),
            Err(CertificateError::InvalidSignature(_))
        );
    }

    #[test]
    fn rejects_signature_under_other_key() {
        let (secret, _) = key_pair(42);
        let (_, other_public) = key_pair(43);
        let signature = sign(&secret, b"message");
        assert_matches!(
            verify(&signature, b"message", &other_public),
            Err(CertificateError::InvalidSignature(_))
        );
    }

    #[test]
    fn rejects_malformed_inputs() {
        let (secret, public) = key_pair(1);
        let signature = sign(&secret, b"message");
        assert_matches!(
            verify(&signature[1..], b"message", &public),
            Err(CertificateError::InvalidSignature(_))
        );
        assert_matches!(
            verify(&signature, b"message", &public[1..]),
            Err(CertificateError::MalformedPublicKey(_))
        );
        assert_matches!(
            verify(&signature, b"message", &[0xff; PUBLIC_KEY_SIZE]),
            Err(CertificateError::MalformedPublicKey(_))
        );
    }

    #[test]
    fn rejects_identity_points() {
        let identity_key = G2Affine::identity().to_compressed();
        let identity_signature = G1Affine::identity().to_compressed();
        // Both sides of the pairing check are trivially equal for this pair.
        assert_matches!(
            verify(&identity_signature, b"any message", &identity_key),
            Err(CertificateError::MalformedPublicKey(_))
        );

        let (_, public) = key_pair(42);
        assert_matches!(
            verify(&identity_signature, b"any message", &public),
            Err(CertificateError::InvalidSignature(_))
        );
    }

    #[test]
    fn der_round_trip() {
        let (_, public) = key_pair(7);
        let der = public_key_to_der(&public);
        assert_eq!(der.len(), 133);
        assert_eq!(
            hex::encode(&der[..37]),
            "308182301d060d2b0601040182dc7c0503010201060c2b0601040182dc7c05030201036100"
        );
        assert_eq!(public_key_from_der(&der), Ok(public));
    }

    #[test]
    fn der_with_wrong_prefix_or_length_is_rejected() {
        let (_, public) = key_pair(7);
        let mut der = public_key_to_der(&public);
        assert_matches!(
            public_key_from_der(&der[..132]),
            Err(CertificateError::MalformedPublicKey(_))
        );
        der[5] ^= 1;
        assert_matches!(
            public_key_from_der(&der),
            Err(CertificateError::MalformedPublicKey(_))
        );
    }
}
