#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]

//! Verification of certified state returned by the replica.
//!
//! A [`Certificate`] carries a [`HashTree`], a BLS signature over the
//! tree's root hash and, for subnets other than the root subnet, a
//! delegation from the root subnet. Values can only be read from a
//! certificate once [`Certificate::verify`] succeeded.
//!
//! ```
//! use ic_agent_certification::HashTree;
//!
//! let tree = HashTree::fork(
//!     HashTree::labeled("time", HashTree::leaf(vec![0x2a])),
//!     HashTree::labeled("subnet", HashTree::Empty),
//! );
//! assert_eq!(tree.lookup(&[b"time"]).unwrap(), &[0x2a]);
//! assert!(tree.lookup(&[b"subnet"]).is_err());
//! ```

pub mod bls;
mod certificate;
mod error;
mod hash_tree;
mod hasher;

pub use certificate::{Certificate, Delegation};
pub use error::{CertificateError, CertificateResult};
pub use hash_tree::{Digest, HashTree};
pub use hasher::domain_separator;
