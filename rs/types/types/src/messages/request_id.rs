use serde::{de::Deserializer, ser::Serializer, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{borrow::Borrow, convert::TryFrom, fmt};
use thiserror::Error;

/// The length of a [`RequestId`] in bytes.
pub const EXPECTED_REQUEST_ID_LENGTH: usize = 32;

/// Prepended to a request id to form the message a sender signs.
pub const IC_REQUEST_DOMAIN_SEPARATOR: &[u8] = b"\x0Aic-request";

/// The representation-independent hash of a request's content. It names the
/// request towards the network and is what the sender signs.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct RequestId([u8; EXPECTED_REQUEST_ID_LENGTH]);

impl RequestId {
    pub fn new(bytes: [u8; EXPECTED_REQUEST_ID_LENGTH]) -> Self {
        RequestId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; EXPECTED_REQUEST_ID_LENGTH] {
        &self.0
    }

    /// The bytes a sender signs to authenticate this request.
    pub fn signable(&self) -> Vec<u8> {
        let mut signable = Vec::with_capacity(IC_REQUEST_DOMAIN_SEPARATOR.len() + self.0.len());
        signable.extend_from_slice(IC_REQUEST_DOMAIN_SEPARATOR);
        signable.extend_from_slice(&self.0);
        signable
    }
}

// serde only derives byte-string handling for `Vec<u8>`, not `[u8; 32]`.
impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'a> Deserialize<'a> for RequestId {
    fn deserialize<D: Deserializer<'a>>(deserializer: D) -> Result<Self, D::Error> {
        struct RequestIdVisitor;

        impl<'de> serde::de::Visitor<'de> for RequestIdVisitor {
            type Value = RequestId;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    formatter,
                    "a request id: a blob with {} bytes",
                    EXPECTED_REQUEST_ID_LENGTH
                )
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                RequestId::try_from(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_bytes(RequestIdVisitor)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", hex::encode(self.0))
    }
}

impl TryFrom<&[u8]> for RequestId {
    type Error = RequestIdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; EXPECTED_REQUEST_ID_LENGTH] =
            bytes.try_into().map_err(|_| RequestIdError::InvalidLength {
                given_length: bytes.len(),
                expected_length: EXPECTED_REQUEST_ID_LENGTH,
            })?;
        Ok(RequestId(array))
    }
}

impl AsRef<[u8]> for RequestId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<[u8; EXPECTED_REQUEST_ID_LENGTH]> for RequestId {
    fn from(bytes: [u8; EXPECTED_REQUEST_ID_LENGTH]) -> Self {
        RequestId(bytes)
    }
}

/// Errors returned when converting to a [`RequestId`] from a blob.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RequestIdError {
    #[error("expected a request id of length {expected_length} bytes, but got {given_length} bytes instead")]
    InvalidLength {
        given_length: usize,
        expected_length: usize,
    },
}

/// A field value of a request as seen by the request-id hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawHttpRequestVal {
    Bytes(Vec<u8>),
    String(String),
    U64(u64),
    Array(Vec<RawHttpRequestVal>),
}

fn hash_bytes(value: &[u8]) -> [u8; 32] {
    Sha256::digest(value).into()
}

fn hash_string(value: &str) -> [u8; 32] {
    hash_bytes(value.as_bytes())
}

// Integers are hashed in their LEB128 form.
fn hash_u64(value: u64) -> [u8; 32] {
    let mut buf = Vec::with_capacity(10);
    // Writing into a `Vec` cannot fail.
    let _ = leb128::write::unsigned(&mut buf, value);
    hash_bytes(&buf)
}

// Arrays hash to the hash of the concatenated hashes of their elements.
fn hash_array(elements: &[RawHttpRequestVal]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for element in elements {
        hasher.update(hash_val(element));
    }
    hasher.finalize().into()
}

fn hash_val(val: &RawHttpRequestVal) -> [u8; 32] {
    match val {
        RawHttpRequestVal::String(string) => hash_string(string),
        RawHttpRequestVal::Bytes(bytes) => hash_bytes(bytes),
        RawHttpRequestVal::U64(integer) => hash_u64(*integer),
        RawHttpRequestVal::Array(elements) => hash_array(elements),
    }
}

fn hash_key_val(key: &str, val: &RawHttpRequestVal) -> Vec<u8> {
    let mut key_val = Vec::with_capacity(64);
    key_val.extend_from_slice(&hash_string(key));
    key_val.extend_from_slice(&hash_val(val));
    key_val
}

/// The representation-independent hash of a map of fields.
///
/// Each entry contributes `H(key) · H(value)`; the entries are sorted
/// bytewise and the concatenation is hashed, so the result does not depend
/// on the order in which the fields are supplied.
pub fn hash_of_map<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> RequestId
where
    K: AsRef<str>,
    V: Borrow<RawHttpRequestVal>,
{
    let mut hashes: Vec<Vec<u8>> = fields
        .into_iter()
        .map(|(key, val)| hash_key_val(key.as_ref(), val.borrow()))
        .collect();
    hashes.sort();

    let mut hasher = Sha256::new();
    for hash in hashes {
        hasher.update(&hash);
    }
    RequestId(hasher.finalize().into())
}
