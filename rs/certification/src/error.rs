use thiserror::Error;

/// Errors that can occur when decoding, verifying or reading certified data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// A lookup was attempted before the certificate was verified.
    #[error("cannot look up paths in an unverified certificate")]
    NotVerified,

    /// The path does not lead to a leaf of the tree.
    #[error("path {0} not found in the hash tree")]
    PathNotFound(String),

    #[error("certificate signature is invalid: {0}")]
    InvalidSignature(String),

    #[error("malformed BLS public key: {0}")]
    MalformedPublicKey(String),

    #[error("invalid delegation: {0}")]
    InvalidDelegation(String),

    #[error("failed to decode certificate: {0}")]
    Decode(String),
}

pub type CertificateResult<T> = Result<T, CertificateError>;

impl From<serde_cbor::Error> for CertificateError {
    fn from(err: serde_cbor::Error) -> Self {
        CertificateError::Decode(err.to_string())
    }
}
