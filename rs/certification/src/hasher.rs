use sha2::{Digest as _, Sha256};

/// The length-prefixed form of a domain string as used in front of every
/// hashed or signed payload: the length as a big-endian `u32` followed by
/// the domain bytes.
pub fn domain_separator(domain: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + domain.len());
    bytes.extend_from_slice(&(domain.len() as u32).to_be_bytes());
    bytes.extend_from_slice(domain.as_bytes());
    bytes
}

/// SHA-256 hasher that is seeded with a domain separator.
pub(crate) struct Hasher(Sha256);

impl Hasher {
    pub(crate) fn for_domain(domain: &str) -> Self {
        let mut hasher = Self(Sha256::new());
        hasher.update(&domain_separator(domain));
        hasher
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    pub(crate) fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest as _;

    #[test]
    fn separator_is_prefixed_with_big_endian_length() {
        assert_eq!(
            domain_separator("ic-state-root"),
            b"\x00\x00\x00\x0dic-state-root".to_vec()
        );
        assert_eq!(domain_separator(""), vec![0, 0, 0, 0]);
    }

    #[test]
    fn hasher_for_domain_hashes_separator_then_data() {
        let mut hasher = Hasher::for_domain("ic-hashtree-leaf");
        hasher.update(b"x");

        let mut expected = domain_separator("ic-hashtree-leaf");
        expected.push(b'x');
        assert_eq!(hasher.finalize(), <[u8; 32]>::from(Sha256::digest(&expected)));
    }
}
