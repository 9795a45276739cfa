//! The Candid type system and the shared type definition table.
use crate::error::{CandidError, CandidResult};
use crate::leb128::{encode_i64, encode_u64};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The four magic bytes every Candid message starts with.
pub const MAGIC: &[u8; 4] = b"DIDL";

/// Type codes as they appear on the wire.
pub(crate) mod opcode {
    pub const NULL: i64 = -1;
    pub const BOOL: i64 = -2;
    pub const NAT: i64 = -3;
    pub const INT: i64 = -4;
    pub const NAT8: i64 = -5;
    pub const NAT16: i64 = -6;
    pub const NAT32: i64 = -7;
    pub const NAT64: i64 = -8;
    pub const INT8: i64 = -9;
    pub const INT16: i64 = -10;
    pub const INT32: i64 = -11;
    pub const INT64: i64 = -12;
    pub const FLOAT32: i64 = -13;
    pub const FLOAT64: i64 = -14;
    pub const TEXT: i64 = -15;
    pub const RESERVED: i64 = -16;
    pub const EMPTY: i64 = -17;
    pub const OPT: i64 = -18;
    pub const VEC: i64 = -19;
    pub const RECORD: i64 = -20;
    pub const VARIANT: i64 = -21;
    pub const FUNC: i64 = -22;
    pub const SERVICE: i64 = -23;
    pub const PRINCIPAL: i64 = -24;
}

/// Hashes a field name the way Candid identifies record and variant fields
/// on the wire.
pub fn idl_hash(name: &str) -> u32 {
    name.bytes()
        .fold(0u32, |h, b| h.wrapping_mul(223).wrapping_add(b as u32))
}

/// A record or variant field label. Only the hash travels on the wire, so
/// decoded labels are always [`Label::Id`] and two labels are equal iff
/// their hashes are.
#[derive(Clone, Debug)]
pub enum Label {
    Named(String),
    Id(u32),
}

impl Label {
    pub fn get_id(&self) -> u32 {
        match self {
            Label::Named(name) => idl_hash(name),
            Label::Id(id) => *id,
        }
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.get_id() == other.get_id()
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.get_id().hash(state)
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::Named(name.to_string())
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Label::Named(name)
    }
}

impl From<u32> for Label {
    fn from(id: u32) -> Self {
        Label::Id(id)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Named(name) => write!(f, "{}", name),
            Label::Id(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub label: Label,
    pub ty: IDLType,
}

impl Field {
    pub fn new(label: impl Into<Label>, ty: IDLType) -> Self {
        Self {
            label: label.into(),
            ty,
        }
    }
}

/// A Candid type.
///
/// Composite types own their children; there is no sharing and no way to
/// express a cycle, which is why recursive wire types are rejected by the
/// decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IDLType {
    Null,
    Bool,
    Nat,
    Int,
    Nat8,
    Nat16,
    Nat32,
    Nat64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Reserved,
    Empty,
    Principal,
    Opt(Box<IDLType>),
    Vec(Box<IDLType>),
    /// Fields in ascending label-hash order.
    Record(Vec<Field>),
    /// Fields in ascending label-hash order.
    Variant(Vec<Field>),
    Func,
    Service,
}

impl IDLType {
    pub fn opt(inner: IDLType) -> Self {
        IDLType::Opt(Box::new(inner))
    }

    pub fn vec(inner: IDLType) -> Self {
        IDLType::Vec(Box::new(inner))
    }

    /// Builds a record type, putting the fields into wire order.
    pub fn record<L: Into<Label>>(fields: impl IntoIterator<Item = (L, IDLType)>) -> Self {
        IDLType::Record(sorted(fields))
    }

    /// Builds a variant type, putting the fields into wire order.
    pub fn variant<L: Into<Label>>(fields: impl IntoIterator<Item = (L, IDLType)>) -> Self {
        IDLType::Variant(sorted(fields))
    }

    /// The fixed negative code of a primitive type, `None` for composites.
    pub fn primitive_code(&self) -> Option<i64> {
        use opcode::*;
        let code = match self {
            IDLType::Null => NULL,
            IDLType::Bool => BOOL,
            IDLType::Nat => NAT,
            IDLType::Int => INT,
            IDLType::Nat8 => NAT8,
            IDLType::Nat16 => NAT16,
            IDLType::Nat32 => NAT32,
            IDLType::Nat64 => NAT64,
            IDLType::Int8 => INT8,
            IDLType::Int16 => INT16,
            IDLType::Int32 => INT32,
            IDLType::Int64 => INT64,
            IDLType::Float32 => FLOAT32,
            IDLType::Float64 => FLOAT64,
            IDLType::Text => TEXT,
            IDLType::Reserved => RESERVED,
            IDLType::Empty => EMPTY,
            IDLType::Principal => PRINCIPAL,
            IDLType::Opt(_)
            | IDLType::Vec(_)
            | IDLType::Record(_)
            | IDLType::Variant(_)
            | IDLType::Func
            | IDLType::Service => return None,
        };
        Some(code)
    }

    /// The primitive type for a negative wire code.
    pub(crate) fn from_primitive_code(code: i64) -> Option<Self> {
        use opcode::*;
        let ty = match code {
            NULL => IDLType::Null,
            BOOL => IDLType::Bool,
            NAT => IDLType::Nat,
            INT => IDLType::Int,
            NAT8 => IDLType::Nat8,
            NAT16 => IDLType::Nat16,
            NAT32 => IDLType::Nat32,
            NAT64 => IDLType::Nat64,
            INT8 => IDLType::Int8,
            INT16 => IDLType::Int16,
            INT32 => IDLType::Int32,
            INT64 => IDLType::Int64,
            FLOAT32 => IDLType::Float32,
            FLOAT64 => IDLType::Float64,
            TEXT => IDLType::Text,
            RESERVED => IDLType::Reserved,
            EMPTY => IDLType::Empty,
            PRINCIPAL => IDLType::Principal,
            _ => return None,
        };
        Some(ty)
    }

    /// Registers this type and, first, all of its children in `table`.
    /// Primitives need no table entry.
    pub fn add_type_definition(&self, table: &mut TypeDefinitionTable) -> CandidResult<()> {
        match self {
            IDLType::Opt(inner) | IDLType::Vec(inner) => inner.add_type_definition(table)?,
            IDLType::Record(fields) | IDLType::Variant(fields) => {
                for field in fields {
                    field.ty.add_type_definition(table)?;
                }
            }
            IDLType::Func => return Err(CandidError::UnsupportedType("func")),
            IDLType::Service => return Err(CandidError::UnsupportedType("service")),
            _ => return Ok(()),
        }
        let definition = self.definition(table)?;
        table.insert(definition);
        Ok(())
    }

    /// Encodes the reference to this type: its primitive code or its index in
    /// `table`, as SLEB128.
    pub fn encode_type(&self, table: &TypeDefinitionTable) -> CandidResult<Vec<u8>> {
        Ok(encode_i64(self.type_ref(table)?))
    }

    fn type_ref(&self, table: &TypeDefinitionTable) -> CandidResult<i64> {
        if let Some(code) = self.primitive_code() {
            return Ok(code);
        }
        let definition = self.definition(table)?;
        table.index_of(&definition).map(i64::from).ok_or_else(|| {
            CandidError::InvalidArgument(format!("type {} is not in the type table", self))
        })
    }

    /// The serialized table entry of a composite type. Children must already
    /// be registered so that their references resolve.
    fn definition(&self, table: &TypeDefinitionTable) -> CandidResult<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            IDLType::Opt(inner) => {
                out.extend(encode_i64(opcode::OPT));
                out.extend(encode_i64(inner.type_ref(table)?));
            }
            IDLType::Vec(inner) => {
                out.extend(encode_i64(opcode::VEC));
                out.extend(encode_i64(inner.type_ref(table)?));
            }
            IDLType::Record(fields) | IDLType::Variant(fields) => {
                let code = if matches!(self, IDLType::Record(_)) {
                    opcode::RECORD
                } else {
                    opcode::VARIANT
                };
                let ordered = wire_order(fields);
                if let Some(pair) = ordered
                    .windows(2)
                    .find(|pair| pair[0].label.get_id() == pair[1].label.get_id())
                {
                    return Err(CandidError::InvalidArgument(format!(
                        "labels {} and {} of {} share the id {}",
                        pair[0].label,
                        pair[1].label,
                        self,
                        pair[0].label.get_id()
                    )));
                }
                out.extend(encode_i64(code));
                out.extend(encode_u64(fields.len() as u64));
                for field in ordered {
                    out.extend(encode_u64(field.label.get_id() as u64));
                    out.extend(encode_i64(field.ty.type_ref(table)?));
                }
            }
            IDLType::Func => return Err(CandidError::UnsupportedType("func")),
            IDLType::Service => return Err(CandidError::UnsupportedType("service")),
            primitive => {
                return Err(CandidError::InvalidArgument(format!(
                    "primitive type {} has no table entry",
                    primitive
                )))
            }
        }
        Ok(out)
    }
}

fn sorted<L: Into<Label>>(fields: impl IntoIterator<Item = (L, IDLType)>) -> Vec<Field> {
    let mut fields: Vec<Field> = fields
        .into_iter()
        .map(|(label, ty)| Field::new(label, ty))
        .collect();
    fields.sort_by_key(|field| field.label.get_id());
    fields
}

/// Fields ordered by ascending label hash, the order the receiver expects
/// them in regardless of how the type was constructed.
pub(crate) fn wire_order(fields: &[Field]) -> Vec<&Field> {
    let mut ordered: Vec<&Field> = fields.iter().collect();
    ordered.sort_by_key(|field| field.label.get_id());
    ordered
}

impl fmt::Display for IDLType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IDLType::Null => "null",
            IDLType::Bool => "bool",
            IDLType::Nat => "nat",
            IDLType::Int => "int",
            IDLType::Nat8 => "nat8",
            IDLType::Nat16 => "nat16",
            IDLType::Nat32 => "nat32",
            IDLType::Nat64 => "nat64",
            IDLType::Int8 => "int8",
            IDLType::Int16 => "int16",
            IDLType::Int32 => "int32",
            IDLType::Int64 => "int64",
            IDLType::Float32 => "float32",
            IDLType::Float64 => "float64",
            IDLType::Text => "text",
            IDLType::Reserved => "reserved",
            IDLType::Empty => "empty",
            IDLType::Principal => "principal",
            IDLType::Func => "func",
            IDLType::Service => "service",
            IDLType::Opt(inner) => return write!(f, "opt {}", inner),
            IDLType::Vec(inner) => return write!(f, "vec {}", inner),
            IDLType::Record(fields) => return write_fields(f, "record", fields),
            IDLType::Variant(fields) => return write_fields(f, "variant", fields),
        };
        write!(f, "{}", name)
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, keyword: &str, fields: &[Field]) -> fmt::Result {
    write!(f, "{} {{", keyword)?;
    for field in fields {
        write!(f, " {}: {};", field.label, field.ty)?;
    }
    write!(f, " }}")
}

/// The type table `T` of a message under construction.
///
/// Maps the serialized shape of each composite type to its index, so that a
/// structurally identical type registered twice gets a single entry. Indices
/// are assigned in append order; an entry only references entries appended
/// before it.
#[derive(Clone, Debug, Default)]
pub struct TypeDefinitionTable {
    indexes: HashMap<Vec<u8>, u32>,
    types: Vec<Vec<u8>>,
}

impl TypeDefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The serialized entries, in index order.
    pub fn entries(&self) -> &[Vec<u8>] {
        &self.types
    }

    pub fn index_of(&self, definition: &[u8]) -> Option<u32> {
        self.indexes.get(definition).copied()
    }

    fn insert(&mut self, definition: Vec<u8>) -> u32 {
        if let Some(index) = self.indexes.get(&definition) {
            return *index;
        }
        let index = self.types.len() as u32;
        self.indexes.insert(definition.clone(), index);
        self.types.push(definition);
        index
    }

    /// Appends the LEB128 entry count followed by every entry to `out`.
    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend(encode_u64(self.types.len() as u64));
        for definition in &self.types {
            out.extend_from_slice(definition);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn field_hashes_match_reference_values() {
        assert_eq!(idl_hash("foo"), 5097222);
        assert_eq!(idl_hash("bar"), 4895187);
        assert_eq!(idl_hash(""), 0);
        assert_eq!(Label::from("foo"), Label::Id(5097222));
    }

    #[test]
    fn constructors_put_fields_in_wire_order() {
        let record = IDLType::record([("foo", IDLType::Nat), ("bar", IDLType::Text)]);
        let IDLType::Record(fields) = record else {
            panic!("expected a record");
        };
        assert_eq!(fields[0].label, Label::from("bar"));
        assert_eq!(fields[1].label, Label::from("foo"));
    }

    #[test]
    fn primitives_have_no_table_entry() {
        let mut table = TypeDefinitionTable::new();
        IDLType::Nat.add_type_definition(&mut table).unwrap();
        assert!(table.is_empty());
        assert_eq!(IDLType::Nat.encode_type(&table).unwrap(), vec![0x7d]);
        assert_eq!(IDLType::Text.encode_type(&table).unwrap(), vec![0x71]);
        assert_eq!(IDLType::Principal.encode_type(&table).unwrap(), vec![0x68]);
    }

    #[test]
    fn children_are_registered_before_parents() {
        let mut table = TypeDefinitionTable::new();
        let ty = IDLType::opt(IDLType::vec(IDLType::Nat8));
        ty.add_type_definition(&mut table).unwrap();
        assert_eq!(table.entries(), &[vec![0x6d, 0x7b], vec![0x6e, 0x00]]);
        assert_eq!(ty.encode_type(&table).unwrap(), vec![0x01]);
    }

    #[test]
    fn identical_types_share_one_entry() {
        let mut table = TypeDefinitionTable::new();
        let a = IDLType::record([("foo", IDLType::Nat)]);
        let b = IDLType::record([(5097222u32, IDLType::Nat)]);
        a.add_type_definition(&mut table).unwrap();
        b.add_type_definition(&mut table).unwrap();
        IDLType::vec(a.clone()).add_type_definition(&mut table).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(a.encode_type(&table).unwrap(), b.encode_type(&table).unwrap());
    }

    #[test]
    fn unregistered_composite_cannot_be_referenced() {
        let table = TypeDefinitionTable::new();
        assert_matches!(
            IDLType::opt(IDLType::Nat).encode_type(&table),
            Err(CandidError::InvalidArgument(_))
        );
    }

    #[test]
    fn labels_with_the_same_id_are_rejected() {
        let mut table = TypeDefinitionTable::new();
        let record = IDLType::record([("foo", IDLType::Nat8), ("foo", IDLType::Nat8)]);
        assert_matches!(
            record.add_type_definition(&mut table),
            Err(CandidError::InvalidArgument(_))
        );
        // "foo" hashes to 5097222.
        let variant = IDLType::variant([
            (Label::from("foo"), IDLType::Null),
            (Label::from(5097222u32), IDLType::Text),
        ]);
        assert_matches!(
            variant.add_type_definition(&mut table),
            Err(CandidError::InvalidArgument(_))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn func_and_service_are_unsupported() {
        let mut table = TypeDefinitionTable::new();
        assert_matches!(
            IDLType::Func.add_type_definition(&mut table),
            Err(CandidError::UnsupportedType("func"))
        );
        assert_matches!(
            IDLType::vec(IDLType::Service).add_type_definition(&mut table),
            Err(CandidError::UnsupportedType("service"))
        );
    }

    #[test]
    fn display_renders_candid_syntax() {
        let ty = IDLType::opt(IDLType::record([("foo", IDLType::vec(IDLType::Nat8))]));
        assert_eq!(ty.to_string(), "opt record { foo: vec nat8; }");
    }
}
