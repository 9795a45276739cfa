use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes that travel as a CBOR byte string rather than an array of
/// integers.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Blob(#[serde(with = "serde_bytes")] pub Vec<u8>);

const MAX_DISPLAYED_BYTES: usize = 40;

impl Blob {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn write_hex(&self, f: &mut fmt::Formatter<'_>, limit: usize) -> fmt::Result {
        match self.0.len() {
            0 => write!(f, "Blob{{empty}}"),
            len if len <= 3 => write!(f, "Blob{{{}}}", hex::encode(&self.0)),
            len if len <= limit => write!(f, "Blob{{{} bytes;{}}}", len, hex::encode(&self.0)),
            len => write!(
                f,
                "Blob{{{} bytes;{}…}}",
                len,
                hex::encode(&self.0[..limit])
            ),
        }
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_hex(f, usize::MAX)
    }
}

/// Like `Debug`, but long blobs are cut off after 40 bytes.
impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_hex(f, MAX_DISPLAYED_BYTES)
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_prints_every_byte() {
        assert_eq!(format!("{:?}", Blob(vec![])), "Blob{empty}");
        assert_eq!(format!("{:?}", Blob(vec![255, 0])), "Blob{ff00}");
        assert_eq!(format!("{:?}", Blob(vec![0, 1, 15, 255])), "Blob{4 bytes;00010fff}");
        let long: Vec<u8> = (0_u8..100_u8).collect();
        let printed = format!("{:?}", Blob(long));
        assert!(printed.starts_with("Blob{100 bytes;"));
        assert!(printed.ends_with("63}"), "{}", printed);
    }

    #[test]
    fn display_truncates_long_blobs() {
        assert_eq!(Blob(vec![1, 2, 3]).to_string(), "Blob{010203}");
        let long: Vec<u8> = (0_u8..100_u8).collect();
        let printed = Blob(long).to_string();
        assert_eq!(printed.len(), "Blob{100 bytes;…}".len() + 40 * 2);
        assert!(printed.ends_with("27…}"), "{}", printed);
    }

    #[test]
    fn serializes_as_a_byte_string() {
        let cbor = serde_cbor::to_vec(&Blob(vec![1, 2])).unwrap();
        assert_eq!(cbor, vec![0x42, 1, 2]);
    }
}
