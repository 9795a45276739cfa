use crate::bls;
use crate::error::{CertificateError, CertificateResult};
use crate::hash_tree::HashTree;
use crate::hasher::domain_separator;
use ic_principal::Principal;
use serde::{Deserialize, Serialize};

const DOMAIN_STATE_ROOT: &str = "ic-state-root";

/// A delegation of the root subnet's authority to the subnet that signed a
/// certificate.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Delegation {
    #[serde(with = "serde_bytes")]
    pub subnet_id: Vec<u8>,
    /// CBOR-encoded certificate, signed by the root subnet, that holds the
    /// delegated subnet's public key and canister ranges.
    #[serde(with = "serde_bytes")]
    pub certificate: Vec<u8>,
}

#[derive(Deserialize, Serialize)]
struct CertificateContent {
    tree: HashTree,
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delegation: Option<Delegation>,
}

/// A certificate over (a part of) the replicated state.
///
/// A certificate starts out unverified; [`Certificate::lookup`] refuses to
/// read from it until [`Certificate::verify`] succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    tree: HashTree,
    signature: Vec<u8>,
    delegation: Option<Delegation>,
    verified: bool,
}

impl Certificate {
    pub fn new(tree: HashTree, signature: Vec<u8>, delegation: Option<Delegation>) -> Self {
        Self {
            tree,
            signature,
            delegation,
            verified: false,
        }
    }

    /// Parses a CBOR-encoded certificate.
    pub fn from_cbor(bytes: &[u8]) -> CertificateResult<Self> {
        let content: CertificateContent = serde_cbor::from_slice(bytes)?;
        Ok(Self::new(content.tree, content.signature, content.delegation))
    }

    /// Encodes the certificate as self-describing CBOR.
    pub fn to_cbor(&self) -> CertificateResult<Vec<u8>> {
        let content = CertificateContent {
            tree: self.tree.clone(),
            signature: self.signature.clone(),
            delegation: self.delegation.clone(),
        };
        let mut serializer = serde_cbor::Serializer::new(Vec::new());
        serializer.self_describe()?;
        content.serialize(&mut serializer)?;
        Ok(serializer.into_inner())
    }

    pub fn tree(&self) -> &HashTree {
        &self.tree
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn delegation(&self) -> Option<&Delegation> {
        self.delegation.as_ref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Verifies the certificate against the DER-encoded root public key.
    ///
    /// If the certificate carries a delegation, the delegation certificate is
    /// verified against the root key first and must authorize the signing
    /// subnet for `effective_canister_id`. The certificate's signature is then
    /// checked over the reconstructed root hash with the subnet's key.
    pub fn verify(
        &mut self,
        root_key: &[u8],
        effective_canister_id: &Principal,
    ) -> CertificateResult<()> {
        let root_hash = self.tree.reconstruct();
        let der_key = self.check_delegation(root_key, effective_canister_id)?;
        let key = bls::public_key_from_der(&der_key)?;

        let mut msg = domain_separator(DOMAIN_STATE_ROOT);
        msg.extend_from_slice(&root_hash);
        bls::verify(&self.signature, &msg, &key)?;

        self.verified = true;
        Ok(())
    }

    /// Returns the DER-encoded key that must have signed this certificate.
    fn check_delegation(
        &self,
        root_key: &[u8],
        effective_canister_id: &Principal,
    ) -> CertificateResult<Vec<u8>> {
        let delegation = match &self.delegation {
            None => return Ok(root_key.to_vec()),
            Some(delegation) => delegation,
        };

        let mut inner = Certificate::from_cbor(&delegation.certificate).map_err(|err| {
            CertificateError::InvalidDelegation(format!("malformed delegation certificate: {}", err))
        })?;
        if inner.delegation.is_some() {
            return Err(CertificateError::InvalidDelegation(
                "delegation certificate must not be delegated itself".to_string(),
            ));
        }
        inner.verify(root_key, effective_canister_id).map_err(|err| {
            CertificateError::InvalidDelegation(format!(
                "delegation certificate does not verify: {}",
                err
            ))
        })?;

        let subnet_id = delegation.subnet_id.as_slice();
        let ranges = inner
            .lookup(&[b"subnet".as_slice(), subnet_id, b"canister_ranges".as_slice()])
            .map_err(|err| CertificateError::InvalidDelegation(err.to_string()))?;
        let ranges: Vec<(Principal, Principal)> = serde_cbor::from_slice(ranges).map_err(|err| {
            CertificateError::InvalidDelegation(format!("malformed canister ranges: {}", err))
        })?;
        let canister_id = effective_canister_id.as_slice();
        if !ranges
            .iter()
            .any(|(low, high)| low.as_slice() <= canister_id && canister_id <= high.as_slice())
        {
            return Err(CertificateError::InvalidDelegation(format!(
                "canister {} is not in the ranges of subnet 0x{}",
                effective_canister_id,
                hex::encode(subnet_id)
            )));
        }

        let public_key = inner
            .lookup(&[b"subnet".as_slice(), subnet_id, b"public_key".as_slice()])
            .map_err(|err| CertificateError::InvalidDelegation(err.to_string()))?;
        Ok(public_key.to_vec())
    }

    /// Looks up `path` in the certified tree. Fails with
    /// [`CertificateError::NotVerified`] before verification.
    pub fn lookup<L: AsRef<[u8]>>(&self, path: &[L]) -> CertificateResult<&[u8]> {
        if !self.verified {
            return Err(CertificateError::NotVerified);
        }
        self.tree.lookup(path)
    }
}
