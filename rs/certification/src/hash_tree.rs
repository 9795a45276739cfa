//! The hash tree of certified state, its root hash and path lookup.

use crate::error::{CertificateError, CertificateResult};
use crate::hasher::Hasher;
use serde::de::{self, Deserializer, Expected, IgnoredAny, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_bytes::{ByteBuf, Bytes};
use std::fmt;


const DOMAIN_HASHTREE_LEAF: &str = "ic-hashtree-leaf";
const DOMAIN_HASHTREE_EMPTY_SUBTREE: &str = "ic-hashtree-empty";
const DOMAIN_HASHTREE_NODE: &str = "ic-hashtree-labeled";
const DOMAIN_HASHTREE_FORK: &str = "ic-hashtree-fork";

const TAG_EMPTY: u8 = 0;
const TAG_FORK: u8 = 1;
const TAG_LABELED: u8 = 2;
const TAG_LEAF: u8 = 3;
const TAG_PRUNED: u8 = 4;

/// A SHA-256 digest.
pub type Digest = [u8; 32];

/// A (possibly partial) hash tree as returned in certificates.
///
/// Every node exclusively owns its children, so a tree is always finite and
/// acyclic.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum HashTree {
    Empty,
    Fork(Box<HashTree>, Box<HashTree>),
    Labeled(Vec<u8>, Box<HashTree>),
    Leaf(Vec<u8>),
    /// A subtree of which only the root hash is known.
    Pruned(Digest),
}

// Helpers for creation of domain-separated hashers.
fn new_leaf_hasher() -> Hasher {
    Hasher::for_domain(DOMAIN_HASHTREE_LEAF)
}

fn new_fork_hasher() -> Hasher {
    Hasher::for_domain(DOMAIN_HASHTREE_FORK)
}

fn new_node_hasher() -> Hasher {
    Hasher::for_domain(DOMAIN_HASHTREE_NODE)
}

fn empty_subtree_hash() -> Digest {
    Hasher::for_domain(DOMAIN_HASHTREE_EMPTY_SUBTREE).finalize()
}

fn compute_leaf_digest(contents: &[u8]) -> Digest {
    let mut hasher = new_leaf_hasher();
    hasher.update(contents);
    hasher.finalize()
}

fn compute_node_digest(label: &[u8], subtree_digest: &Digest) -> Digest {
    let mut hasher = new_node_hasher();
    hasher.update(label);
    hasher.update(subtree_digest);
    hasher.finalize()
}

fn compute_fork_digest(left_digest: &Digest, right_digest: &Digest) -> Digest {
    let mut hasher = new_fork_hasher();
    hasher.update(left_digest);
    hasher.update(right_digest);
    hasher.finalize()
}

impl HashTree {
    pub fn fork(left: HashTree, right: HashTree) -> Self {
        HashTree::Fork(Box::new(left), Box::new(right))
    }

    pub fn labeled(label: impl Into<Vec<u8>>, subtree: HashTree) -> Self {
        HashTree::Labeled(label.into(), Box::new(subtree))
    }

    pub fn leaf(contents: impl Into<Vec<u8>>) -> Self {
        HashTree::Leaf(contents.into())
    }

    pub fn pruned(digest: Digest) -> Self {
        HashTree::Pruned(digest)
    }

    /// Recomputes the root hash of the tree. Pruned subtrees contribute
    /// their recorded hash.
    pub fn reconstruct(&self) -> Digest {
        match self {
            HashTree::Empty => empty_subtree_hash(),
            HashTree::Fork(left, right) => {
                compute_fork_digest(&left.reconstruct(), &right.reconstruct())
            }
            HashTree::Labeled(label, subtree) => {
                compute_node_digest(label, &subtree.reconstruct())
            }
            HashTree::Leaf(contents) => compute_leaf_digest(contents),
            HashTree::Pruned(digest) => *digest,
        }
    }

    /// Returns the contents of the leaf found by following `path` from the
    /// root.
    ///
    /// Forks are transparent: at every step the label is searched among the
    /// nodes reachable through forks only. The lookup fails with
    /// [`CertificateError::PathNotFound`] if a label is missing, if the path
    /// runs into a pruned subtree, or if it ends on anything but a leaf.
    pub fn lookup<L: AsRef<[u8]>>(&self, path: &[L]) -> CertificateResult<&[u8]> {
        let not_found = || CertificateError::PathNotFound(path_as_string(path));

        let mut tree = self;
        for label in path {
            tree = tree.find_label(label.as_ref()).ok_or_else(not_found)?;
        }
        match tree {
            HashTree::Leaf(contents) => Ok(contents),
            _ => Err(not_found()),
        }
    }

    /// The direct children of this node once all forks are flattened.
    fn flatten_forks(&self) -> Vec<&HashTree> {
        let mut children = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            match tree {
                HashTree::Empty => {}
                HashTree::Fork(left, right) => {
                    stack.push(right);
                    stack.push(left);
                }
                other => children.push(other),
            }
        }
        children
    }

    fn find_label(&self, label: &[u8]) -> Option<&HashTree> {
        self.flatten_forks()
            .into_iter()
            .find_map(|child| match child {
                HashTree::Labeled(l, subtree) if l.as_slice() == label => Some(subtree.as_ref()),
                _ => None,
            })
    }
}

fn label_as_string(label: &[u8]) -> String {
    if !label.is_empty() && label.iter().all(|b| b.is_ascii_graphic()) {
        String::from_utf8_lossy(label).into_owned()
    } else {
        format!("0x{}", hex::encode(label))
    }
}

fn path_as_string<L: AsRef<[u8]>>(path: &[L]) -> String {
    let labels: Vec<String> = path
        .iter()
        .map(|label| label_as_string(label.as_ref()))
        .collect();
    format!("[{}]", labels.join("/"))
}

fn write_hash_tree(tree: &HashTree, level: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let indent = " ".repeat(level * 4);
    match tree {
        HashTree::Empty => writeln!(f, "{}()", indent),
        HashTree::Fork(left, right) => {
            writeln!(f, "{}+-- fork", indent)?;
            write_hash_tree(left, level + 1, f)?;
            write_hash_tree(right, level + 1, f)
        }
        HashTree::Labeled(label, subtree) => {
            writeln!(f, "{}--- node: [{}]", indent, label_as_string(label))?;
            write_hash_tree(subtree, level + 1, f)
        }
        HashTree::Leaf(contents) => {
            writeln!(f, "{}\\__ leaf: {} bytes", indent, contents.len())
        }
        HashTree::Pruned(digest) => writeln!(f, "{}\\__ pruned: {}", indent, hex::encode(digest)),
    }
}

impl fmt::Debug for HashTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        write_hash_tree(self, 0, f)
    }
}

// Hash trees are encoded as CBOR arrays whose first element is the node tag:
// `[0]`, `[1, left, right]`, `[2, label, subtree]`, `[3, contents]` and
// `[4, digest]`.
impl Serialize for HashTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HashTree::Empty => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&TAG_EMPTY)?;
                seq.end()
            }
            HashTree::Fork(left, right) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&TAG_FORK)?;
                seq.serialize_element(left.as_ref())?;
                seq.serialize_element(right.as_ref())?;
                seq.end()
            }
            HashTree::Labeled(label, subtree) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&TAG_LABELED)?;
                seq.serialize_element(Bytes::new(label))?;
                seq.serialize_element(subtree.as_ref())?;
                seq.end()
            }
            HashTree::Leaf(contents) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&TAG_LEAF)?;
                seq.serialize_element(Bytes::new(contents))?;
                seq.end()
            }
            HashTree::Pruned(digest) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&TAG_PRUNED)?;
                seq.serialize_element(Bytes::new(digest))?;
                seq.end()
            }
        }
    }
}

struct HashTreeVisitor;

fn next_element<'de, T, A>(seq: &mut A, index: usize, expected: &dyn Expected) -> Result<T, A::Error>
where
    T: Deserialize<'de>,
    A: SeqAccess<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, expected))
}

impl<'de> Visitor<'de> for HashTreeVisitor {
    type Value = HashTree;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "a hash tree node encoded as a tagged array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let tag: u8 = next_element(&mut seq, 0, &self)?;
        let (tree, len) = match tag {
            TAG_EMPTY => (HashTree::Empty, 1),
            TAG_FORK => {
                let left: HashTree = next_element(&mut seq, 1, &"a fork with two subtrees")?;
                let right: HashTree = next_element(&mut seq, 2, &"a fork with two subtrees")?;
                (HashTree::fork(left, right), 3)
            }
            TAG_LABELED => {
                let label: ByteBuf = next_element(&mut seq, 1, &"a labeled node")?;
                let subtree: HashTree = next_element(&mut seq, 2, &"a labeled node")?;
                (HashTree::labeled(label.into_vec(), subtree), 3)
            }
            TAG_LEAF => {
                let contents: ByteBuf = next_element(&mut seq, 1, &"a leaf with contents")?;
                (HashTree::Leaf(contents.into_vec()), 2)
            }
            TAG_PRUNED => {
                let digest: ByteBuf = next_element(&mut seq, 1, &"a pruned node with a digest")?;
                let digest: Digest = digest
                    .as_slice()
                    .try_into()
                    .map_err(|_| {
                        <A::Error as de::Error>::invalid_length(digest.len(), &"a 32-byte digest")
                    })?;
                (HashTree::Pruned(digest), 2)
            }
            other => {
                return Err(de::Error::custom(format!(
                    "unknown hash tree node tag {}",
                    other
                )))
            }
        };
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(len + 1, &self));
        }
        Ok(tree)
    }
}

impl<'de> Deserialize<'de> for HashTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(HashTreeVisitor)
    }
}
