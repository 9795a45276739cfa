use crate::types::Label;
use ic_principal::Principal;
use num_bigint::{BigInt, BigUint};
use std::fmt;

/// A dynamically typed Candid value.
///
/// Records and variants carry the labels they were built with; decoded
/// values always carry [`Label::Id`] since names are not on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum IDLValue {
    Null,
    Bool(bool),
    Nat(BigUint),
    Int(BigInt),
    Nat8(u8),
    Nat16(u16),
    Nat32(u32),
    Nat64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Reserved,
    Principal(Principal),
    Opt(Option<Box<IDLValue>>),
    Vec(Vec<IDLValue>),
    Record(Vec<(Label, IDLValue)>),
    Variant(Label, Box<IDLValue>),
}

impl IDLValue {
    pub fn none() -> Self {
        IDLValue::Opt(None)
    }

    pub fn some(value: IDLValue) -> Self {
        IDLValue::Opt(Some(Box::new(value)))
    }

    /// Builds a record value with its fields in ascending label-hash order.
    pub fn record<L: Into<Label>>(fields: impl IntoIterator<Item = (L, IDLValue)>) -> Self {
        let mut fields: Vec<(Label, IDLValue)> = fields
            .into_iter()
            .map(|(label, value)| (label.into(), value))
            .collect();
        fields.sort_by_key(|(label, _)| label.get_id());
        IDLValue::Record(fields)
    }

    pub fn variant(label: impl Into<Label>, value: IDLValue) -> Self {
        IDLValue::Variant(label.into(), Box::new(value))
    }

    /// Looks up a record field by label.
    pub fn field(&self, label: impl Into<Label>) -> Option<&IDLValue> {
        let label = label.into();
        match self {
            IDLValue::Record(fields) => fields
                .iter()
                .find(|(candidate, _)| *candidate == label)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            IDLValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for IDLValue {
    fn from(value: bool) -> Self {
        IDLValue::Bool(value)
    }
}

impl From<&str> for IDLValue {
    fn from(value: &str) -> Self {
        IDLValue::Text(value.to_string())
    }
}

impl From<String> for IDLValue {
    fn from(value: String) -> Self {
        IDLValue::Text(value)
    }
}

impl From<BigUint> for IDLValue {
    fn from(value: BigUint) -> Self {
        IDLValue::Nat(value)
    }
}

impl From<BigInt> for IDLValue {
    fn from(value: BigInt) -> Self {
        IDLValue::Int(value)
    }
}

impl From<Principal> for IDLValue {
    fn from(value: Principal) -> Self {
        IDLValue::Principal(value)
    }
}

impl From<Vec<u8>> for IDLValue {
    /// A blob, i.e. `vec nat8`.
    fn from(bytes: Vec<u8>) -> Self {
        IDLValue::Vec(bytes.into_iter().map(IDLValue::Nat8).collect())
    }
}

macro_rules! from_fixed_width {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for IDLValue {
                fn from(value: $ty) -> Self {
                    IDLValue::$variant(value)
                }
            }
        )*
    };
}

from_fixed_width!(
    u8 => Nat8,
    u16 => Nat16,
    u32 => Nat32,
    u64 => Nat64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

impl fmt::Display for IDLValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IDLValue::Null => write!(f, "null"),
            IDLValue::Bool(b) => write!(f, "{}", b),
            IDLValue::Nat(n) => write!(f, "{}", n),
            IDLValue::Int(i) => write!(f, "{}", i),
            IDLValue::Nat8(n) => write!(f, "{} : nat8", n),
            IDLValue::Nat16(n) => write!(f, "{} : nat16", n),
            IDLValue::Nat32(n) => write!(f, "{} : nat32", n),
            IDLValue::Nat64(n) => write!(f, "{} : nat64", n),
            IDLValue::Int8(i) => write!(f, "{} : int8", i),
            IDLValue::Int16(i) => write!(f, "{} : int16", i),
            IDLValue::Int32(i) => write!(f, "{} : int32", i),
            IDLValue::Int64(i) => write!(f, "{} : int64", i),
            IDLValue::Float32(x) => write!(f, "{} : float32", x),
            IDLValue::Float64(x) => write!(f, "{} : float64", x),
            IDLValue::Text(s) => write!(f, "{:?}", s),
            IDLValue::Reserved => write!(f, "reserved"),
            IDLValue::Principal(p) => write!(f, "principal \"{}\"", p),
            IDLValue::Opt(None) => write!(f, "null"),
            IDLValue::Opt(Some(inner)) => write!(f, "opt {}", inner),
            IDLValue::Vec(items) => {
                write!(f, "vec {{")?;
                for item in items {
                    write!(f, " {};", item)?;
                }
                write!(f, " }}")
            }
            IDLValue::Record(fields) => {
                write!(f, "record {{")?;
                for (label, value) in fields {
                    write!(f, " {} = {};", label, value)?;
                }
                write!(f, " }}")
            }
            IDLValue::Variant(label, value) => write!(f, "variant {{ {} = {} }}", label, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_fields_are_found_by_name_or_hash() {
        let record = IDLValue::record([("foo", IDLValue::from(1u8)), ("bar", IDLValue::from("x"))]);
        assert_eq!(record.field("foo"), Some(&IDLValue::Nat8(1)));
        assert_eq!(record.field(4895187u32).and_then(IDLValue::as_text), Some("x"));
        assert_eq!(record.field("baz"), None);
    }

    #[test]
    fn blobs_become_nat8_vectors() {
        assert_eq!(
            IDLValue::from(vec![1u8, 2]),
            IDLValue::Vec(vec![IDLValue::Nat8(1), IDLValue::Nat8(2)])
        );
    }

    #[test]
    fn display_is_readable() {
        let value = IDLValue::some(IDLValue::variant("ok", IDLValue::from("done")));
        assert_eq!(value.to_string(), "opt variant { ok = \"done\" }");
    }
}
