//! Builders for certificates that are signed for real, with deterministic or
//! random BLS12-381 keys, for testing certificate verification and the
//! components that consume certified state.

use ic_agent_certification::bls::{hash_to_g1, public_key_to_der};
use ic_agent_certification::{domain_separator, Certificate, Delegation, HashTree};
use ic_bls12_381::{G1Affine, G2Affine, Scalar};
use ic_principal::Principal;
use rand::{CryptoRng, RngCore};

/// The contents a [`CertificateBuilder`] certifies.
pub enum CertificateData {
    /// An arbitrary state tree.
    CustomTree(HashTree),
    /// The subnet entry of a delegation certificate: the subnet's canister
    /// ranges and the public key of the certificate being delegated to.
    SubnetData {
        subnet_id: Principal,
        canister_id_ranges: Vec<(Principal, Principal)>,
    },
}

/// Builds CBOR-encoded certificates together with the root key they verify
/// against.
pub struct CertificateBuilder {
    data: CertificateData,
    secret_key: Scalar,
    delegation: Option<Box<CertificateBuilder>>,
    invalid_signature: bool,
}

impl CertificateBuilder {
    /// A builder with a random signing key.
    pub fn new(data: CertificateData) -> Self {
        Self::new_with_rng(data, &mut rand::thread_rng())
    }

    pub fn new_with_rng<R: RngCore + CryptoRng>(data: CertificateData, rng: &mut R) -> Self {
        let mut bytes = [0u8; 64];
        rng.fill_bytes(&mut bytes);
        Self::with_secret_key(data, Scalar::from_bytes_wide(&bytes))
    }

    /// A builder whose signing key is derived from `seed`, so that the keys
    /// and signatures are reproducible. `seed` must not be zero.
    pub fn new_with_seed(data: CertificateData, seed: u64) -> Self {
        assert_ne!(seed, 0, "a zero seed yields the identity as public key");
        Self::with_secret_key(data, Scalar::from(seed))
    }

    fn with_secret_key(data: CertificateData, secret_key: Scalar) -> Self {
        Self {
            data,
            secret_key,
            delegation: None,
            invalid_signature: false,
        }
    }

    /// Makes the certificate signed by a subnet whose authority is delegated
    /// by `delegation`, which must hold [`CertificateData::SubnetData`]. The
    /// delegation's key becomes the root key.
    pub fn with_delegation(mut self, delegation: CertificateBuilder) -> Self {
        assert!(
            matches!(delegation.data, CertificateData::SubnetData { .. }),
            "a delegation must certify subnet data"
        );
        self.delegation = Some(Box::new(delegation));
        self
    }

    /// Signs a different root hash than the one of the built tree.
    pub fn with_invalid_signature(mut self) -> Self {
        self.invalid_signature = true;
        self
    }

    /// The DER-encoded public key of this builder's signing key.
    pub fn public_key_der(&self) -> Vec<u8> {
        let public_key = G2Affine::from(G2Affine::generator() * self.secret_key);
        public_key_to_der(&public_key.to_compressed())
    }

    /// Returns the unverified certificate, the DER-encoded root key to verify
    /// it with, and its CBOR encoding.
    pub fn build(&self) -> (Certificate, Vec<u8>, Vec<u8>) {
        let (delegation, root_key) = match &self.delegation {
            None => (None, self.public_key_der()),
            Some(builder) => {
                let tree = builder.tree(&self.public_key_der());
                let certificate = Certificate::new(tree.clone(), builder.sign(&tree), None);
                let delegation = Delegation {
                    subnet_id: builder.subnet_id().as_slice().to_vec(),
                    certificate: certificate
                        .to_cbor()
                        .expect("failed to encode delegation certificate"),
                };
                (Some(delegation), builder.public_key_der())
            }
        };

        let tree = self.tree(&self.public_key_der());
        let certificate = Certificate::new(tree.clone(), self.sign(&tree), delegation);
        let cbor = certificate
            .to_cbor()
            .expect("failed to encode certificate");
        (certificate, root_key, cbor)
    }

    fn tree(&self, delegated_key: &[u8]) -> HashTree {
        match &self.data {
            CertificateData::CustomTree(tree) => tree.clone(),
            CertificateData::SubnetData {
                subnet_id,
                canister_id_ranges,
            } => {
                let ranges = serde_cbor::to_vec(canister_id_ranges)
                    .expect("failed to encode canister ranges");
                HashTree::labeled(
                    "subnet",
                    HashTree::labeled(
                        subnet_id.as_slice(),
                        HashTree::fork(
                            HashTree::labeled("canister_ranges", HashTree::leaf(ranges)),
                            HashTree::labeled("public_key", HashTree::leaf(delegated_key)),
                        ),
                    ),
                )
            }
        }
    }

    fn subnet_id(&self) -> Principal {
        match &self.data {
            CertificateData::SubnetData { subnet_id, .. } => *subnet_id,
            CertificateData::CustomTree(_) => panic!("no subnet id in a custom tree"),
        }
    }

    fn sign(&self, tree: &HashTree) -> Vec<u8> {
        let mut root_hash = tree.reconstruct();
        if self.invalid_signature {
            root_hash[0] ^= 1;
        }
        let mut msg = domain_separator("ic-state-root");
        msg.extend_from_slice(&root_hash);
        G1Affine::from(hash_to_g1(&msg) * self.secret_key)
            .to_compressed()
            .to_vec()
    }
}

/// Combines the trees into a balanced fork.
pub fn fork_of(mut trees: Vec<HashTree>) -> HashTree {
    match trees.len() {
        0 => HashTree::Empty,
        1 => trees.remove(0),
        len => {
            let right = trees.split_off(len / 2);
            HashTree::fork(fork_of(trees), fork_of(right))
        }
    }
}

/// The state tree of a single call's status:
/// `/request_status/<request_id>/<label>` for every entry.
pub fn request_status_tree(request_id: &[u8], entries: Vec<(&str, Vec<u8>)>) -> HashTree {
    let entries = entries
        .into_iter()
        .map(|(label, contents)| HashTree::labeled(label, HashTree::leaf(contents)))
        .collect();
    HashTree::labeled(
        "request_status",
        HashTree::labeled(request_id, fork_of(entries)),
    )
}

/// LEB128 encoding of `n`, as used for numbers in the state tree.
pub fn leb128_encode(n: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    leb128::write::unsigned(&mut buf, n).expect("writing to a Vec cannot fail");
    buf
}

/// The canister id with the given index: eight big-endian bytes followed by
/// `0x01 0x01`.
pub fn canister_id(id: u64) -> Principal {
    let mut bytes = id.to_be_bytes().to_vec();
    bytes.extend_from_slice(&[0x01, 0x01]);
    Principal::from_slice(&bytes)
}

/// A 29-byte subnet id derived from `id`.
pub fn subnet_id(id: u64) -> Principal {
    let mut bytes = [0u8; 29];
    bytes[..8].copy_from_slice(&id.to_be_bytes());
    bytes[28] = 0x02;
    Principal::from_slice(&bytes)
}
