#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]

//! Binary encoding and decoding of Candid messages.
//!
//! A message is laid out as
//!
//! ```text
//! "DIDL" · T (type table) · I (argument types) · M (argument values)
//! ```
//!
//! Composite types (`opt`, `vec`, `record`, `variant`) are described once in
//! the shared type table `T` and referenced by their non-negative index;
//! primitive types are referenced by a fixed negative code. All integers on
//! the wire are LEB128 (unsigned) or SLEB128 (signed).
//!
//! ```
//! use ic_candid_codec::{decode, encode, IDLType, IDLValue};
//!
//! let bytes = encode(&[IDLType::Text], &[IDLValue::from("hello")]).unwrap();
//! let (types, values) = decode(&bytes).unwrap();
//! assert_eq!(types, vec![IDLType::Text]);
//! assert_eq!(values, vec![IDLValue::from("hello")]);
//! ```
mod decode;
mod encode;
mod error;
pub mod leb128;
mod reader;
mod types;
mod value;

pub use decode::decode;
pub use encode::encode;
pub use error::{CandidError, CandidResult};
pub use reader::Reader;
pub use types::{idl_hash, Field, IDLType, Label, TypeDefinitionTable, MAGIC};
pub use value::IDLValue;
