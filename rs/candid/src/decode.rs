use crate::error::{CandidError, CandidResult};
use crate::reader::Reader;
use crate::types::{opcode, Field, IDLType, MAGIC};
use crate::value::IDLValue;
use ic_principal::Principal;

/// Types nested deeper than this are rejected instead of exhausting the
/// stack.
const MAX_TYPE_DEPTH: usize = 256;

/// Upper bound on the number of nodes in a single resolved type. Table
/// entries may share children, so without a bound a short table could
/// describe an exponentially large type.
const MAX_TYPE_NODES: usize = 1 << 16;

/// Upper bound on the length of a vector whose elements occupy no bytes,
/// e.g. `vec null`; other vectors are bounded by the remaining input.
const MAX_ZERO_SIZED_VEC_LEN: usize = 1 << 20;

/// Upper bound on the number of values in one message that occupy no bytes.
/// Every other value consumes input, so this bounds the size of the decoded
/// message even when zero-sized vectors nest inside each other.
const MAX_ZERO_SIZED_VALUES: usize = 1 << 21;

/// A type table entry as read from the wire, before its references are
/// resolved.
#[derive(Debug)]
enum RawType {
    Opt(i64),
    Vec(i64),
    Record(Vec<(u32, i64)>),
    Variant(Vec<(u32, i64)>),
}

/// Decodes a Candid message into its argument types and values.
///
/// The whole input must be consumed; leftover bytes after the last value
/// fail with [`CandidError::TrailingBytes`].
pub fn decode(bytes: &[u8]) -> CandidResult<(Vec<IDLType>, Vec<IDLValue>)> {
    let mut reader = Reader::new(bytes);
    if reader.read_bytes(MAGIC.len(), "magic")? != MAGIC {
        return Err(CandidError::MagicMismatch);
    }

    let raw = read_type_table(&mut reader)?;
    let mut table = TypeTable::new(&raw);

    let count = read_count(&mut reader, "argument types")?;
    let mut types = Vec::with_capacity(count);
    for _ in 0..count {
        let index = reader.read_i64()?;
        types.push(table.resolve(index, 0)?);
    }

    let mut values = Vec::with_capacity(types.len());
    let mut budget = MAX_ZERO_SIZED_VALUES;
    for ty in &types {
        values.push(decode_value(ty, &mut reader, &mut budget)?);
    }

    if !reader.is_empty() {
        return Err(CandidError::TrailingBytes(reader.remaining()));
    }
    Ok((types, values))
}

/// Reads a count of items that occupy at least one byte each.
fn read_count(reader: &mut Reader<'_>, what: &'static str) -> CandidResult<usize> {
    let count = reader.read_len(what)?;
    if count > reader.remaining() {
        return Err(CandidError::TruncatedInput(what));
    }
    Ok(count)
}

fn read_type_table(reader: &mut Reader<'_>) -> CandidResult<Vec<RawType>> {
    let count = read_count(reader, "type table")?;
    let mut raw = Vec::with_capacity(count);
    for _ in 0..count {
        let entry = match reader.read_i64()? {
            opcode::OPT => RawType::Opt(reader.read_i64()?),
            opcode::VEC => RawType::Vec(reader.read_i64()?),
            opcode::RECORD => RawType::Record(read_fields(reader)?),
            opcode::VARIANT => RawType::Variant(read_fields(reader)?),
            opcode::FUNC => return Err(CandidError::UnsupportedType("func")),
            opcode::SERVICE => return Err(CandidError::UnsupportedType("service")),
            other => {
                return Err(CandidError::Format(format!(
                    "type table entry with opcode {}",
                    other
                )))
            }
        };
        raw.push(entry);
    }
    Ok(raw)
}

fn read_fields(reader: &mut Reader<'_>) -> CandidResult<Vec<(u32, i64)>> {
    let count = read_count(reader, "field list")?;
    let mut fields: Vec<(u32, i64)> = Vec::with_capacity(count);
    for _ in 0..count {
        let raw_hash = reader.read_u64()?;
        let hash = u32::try_from(raw_hash)
            .map_err(|_| CandidError::Format(format!("field hash {} exceeds 32 bits", raw_hash)))?;
        if let Some((previous, _)) = fields.last() {
            if hash <= *previous {
                return Err(CandidError::Format(format!(
                    "field {} does not follow field {} in ascending order",
                    hash, previous
                )));
            }
        }
        fields.push((hash, reader.read_i64()?));
    }
    Ok(fields)
}

/// Resolves raw table entries into owned types on demand.
///
/// Entries may reference entries that come later in the table, so
/// resolution recurses over the raw table rather than walking it in order.
/// Results are memoized along with their node count; an entry reached again
/// while it is still being resolved is a cycle, which owned types cannot
/// express.
struct TypeTable<'a> {
    raw: &'a [RawType],
    resolved: Vec<Option<(IDLType, usize)>>,
    in_progress: Vec<bool>,
}

impl<'a> TypeTable<'a> {
    fn new(raw: &'a [RawType]) -> Self {
        Self {
            raw,
            resolved: vec![None; raw.len()],
            in_progress: vec![false; raw.len()],
        }
    }

    fn resolve(&mut self, index: i64, depth: usize) -> CandidResult<IDLType> {
        self.resolve_sized(index, depth).map(|(ty, _)| ty)
    }

    fn resolve_sized(&mut self, index: i64, depth: usize) -> CandidResult<(IDLType, usize)> {
        if index < 0 {
            return match index {
                opcode::FUNC => Err(CandidError::UnsupportedType("func")),
                opcode::SERVICE => Err(CandidError::UnsupportedType("service")),
                code => IDLType::from_primitive_code(code)
                    .map(|ty| (ty, 1))
                    .ok_or(CandidError::UnknownTypeIndex(code)),
            };
        }
        if depth > MAX_TYPE_DEPTH {
            return Err(CandidError::Format(format!(
                "types nested deeper than {} levels",
                MAX_TYPE_DEPTH
            )));
        }

        let slot = usize::try_from(index)
            .ok()
            .filter(|slot| *slot < self.raw.len())
            .ok_or(CandidError::UnknownTypeIndex(index))?;
        if let Some(done) = &self.resolved[slot] {
            return Ok(done.clone());
        }
        if self.in_progress[slot] {
            return Err(CandidError::UnknownTypeIndex(index));
        }

        self.in_progress[slot] = true;
        let resolved = self.resolve_entry(slot, depth)?;
        self.in_progress[slot] = false;
        if resolved.1 > MAX_TYPE_NODES {
            return Err(CandidError::Format(format!(
                "type at index {} has more than {} nodes",
                index, MAX_TYPE_NODES
            )));
        }
        self.resolved[slot] = Some(resolved.clone());
        Ok(resolved)
    }

    fn resolve_entry(&mut self, slot: usize, depth: usize) -> CandidResult<(IDLType, usize)> {
        let raw = self.raw;
        match &raw[slot] {
            RawType::Opt(inner) => {
                let (inner, size) = self.resolve_sized(*inner, depth + 1)?;
                Ok((IDLType::opt(inner), size + 1))
            }
            RawType::Vec(inner) => {
                let (inner, size) = self.resolve_sized(*inner, depth + 1)?;
                Ok((IDLType::vec(inner), size + 1))
            }
            RawType::Record(fields) => {
                let (fields, size) = self.resolve_fields(fields, depth)?;
                Ok((IDLType::Record(fields), size + 1))
            }
            RawType::Variant(fields) => {
                let (fields, size) = self.resolve_fields(fields, depth)?;
                Ok((IDLType::Variant(fields), size + 1))
            }
        }
    }

    fn resolve_fields(
        &mut self,
        fields: &[(u32, i64)],
        depth: usize,
    ) -> CandidResult<(Vec<Field>, usize)> {
        let mut resolved = Vec::with_capacity(fields.len());
        let mut total = 0usize;
        for (hash, index) in fields {
            let (ty, size) = self.resolve_sized(*index, depth + 1)?;
            total = total.saturating_add(size);
            if total > MAX_TYPE_NODES {
                return Err(CandidError::Format(format!(
                    "record or variant with more than {} nodes",
                    MAX_TYPE_NODES
                )));
            }
            resolved.push(Field::new(*hash, ty));
        }
        Ok((resolved, total))
    }
}

/// Decodes one value of type `ty`. `budget` is the number of zero-sized
/// values the rest of the message may still produce.
fn decode_value(
    ty: &IDLType,
    reader: &mut Reader<'_>,
    budget: &mut usize,
) -> CandidResult<IDLValue> {
    let start = reader.position();
    let value = match ty {
        IDLType::Null => IDLValue::Null,
        IDLType::Bool => match reader.read_byte("bool")? {
            0 => IDLValue::Bool(false),
            1 => IDLValue::Bool(true),
            other => return Err(CandidError::Format(format!("invalid bool byte {}", other))),
        },
        IDLType::Nat => IDLValue::Nat(reader.read_nat()?),
        IDLType::Int => IDLValue::Int(reader.read_int()?),
        IDLType::Nat8 => IDLValue::Nat8(reader.read_byte("nat8")?),
        IDLType::Nat16 => IDLValue::Nat16(u16::from_le_bytes(reader.read_array("nat16")?)),
        IDLType::Nat32 => IDLValue::Nat32(u32::from_le_bytes(reader.read_array("nat32")?)),
        IDLType::Nat64 => IDLValue::Nat64(u64::from_le_bytes(reader.read_array("nat64")?)),
        IDLType::Int8 => IDLValue::Int8(i8::from_le_bytes(reader.read_array("int8")?)),
        IDLType::Int16 => IDLValue::Int16(i16::from_le_bytes(reader.read_array("int16")?)),
        IDLType::Int32 => IDLValue::Int32(i32::from_le_bytes(reader.read_array("int32")?)),
        IDLType::Int64 => IDLValue::Int64(i64::from_le_bytes(reader.read_array("int64")?)),
        IDLType::Float32 => IDLValue::Float32(f32::from_le_bytes(reader.read_array("float32")?)),
        IDLType::Float64 => IDLValue::Float64(f64::from_le_bytes(reader.read_array("float64")?)),
        IDLType::Text => {
            let len = reader.read_len("text length")?;
            let bytes = reader.read_bytes(len, "text")?;
            let text = std::str::from_utf8(bytes)
                .map_err(|e| CandidError::Format(format!("text is not UTF-8: {}", e)))?;
            IDLValue::Text(text.to_string())
        }
        IDLType::Reserved => IDLValue::Reserved,
        IDLType::Empty => {
            return Err(CandidError::Format(
                "a value of type empty cannot exist".to_string(),
            ))
        }
        IDLType::Principal => {
            if reader.read_byte("principal flag")? != 1 {
                return Err(CandidError::Format(
                    "opaque principal references are not supported".to_string(),
                ));
            }
            let len = reader.read_len("principal length")?;
            let bytes = reader.read_bytes(len, "principal")?;
            let principal = Principal::try_from_slice(bytes)
                .map_err(|e| CandidError::Format(format!("invalid principal: {}", e)))?;
            IDLValue::Principal(principal)
        }
        IDLType::Opt(inner) => match reader.read_byte("opt tag")? {
            0 => IDLValue::Opt(None),
            1 => IDLValue::some(decode_value(inner, reader, budget)?),
            other => return Err(CandidError::Format(format!("invalid opt tag {}", other))),
        },
        IDLType::Vec(inner) => {
            let len = reader.read_len("vec length")?;
            if is_zero_sized(inner) {
                if len > MAX_ZERO_SIZED_VEC_LEN {
                    return Err(CandidError::Format(format!(
                        "vec of {} zero-sized elements",
                        len
                    )));
                }
            } else if len > reader.remaining() {
                return Err(CandidError::TruncatedInput("vec elements"));
            }
            let mut items = Vec::with_capacity(len.min(reader.remaining()));
            for _ in 0..len {
                items.push(decode_value(inner, reader, budget)?);
            }
            IDLValue::Vec(items)
        }
        IDLType::Record(fields) => {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                let value = decode_value(&field.ty, reader, budget)?;
                values.push((field.label.clone(), value));
            }
            IDLValue::Record(values)
        }
        IDLType::Variant(fields) => {
            let index = reader.read_len("variant index")?;
            let field = fields.get(index).ok_or_else(|| {
                CandidError::Format(format!(
                    "variant index {} out of range for {} fields",
                    index,
                    fields.len()
                ))
            })?;
            let value = decode_value(&field.ty, reader, budget)?;
            IDLValue::Variant(field.label.clone(), Box::new(value))
        }
        IDLType::Func => return Err(CandidError::UnsupportedType("func")),
        IDLType::Service => return Err(CandidError::UnsupportedType("service")),
    };
    if reader.position() == start {
        *budget = budget.checked_sub(1).ok_or_else(|| {
            CandidError::Format(format!(
                "more than {} zero-sized values",
                MAX_ZERO_SIZED_VALUES
            ))
        })?;
    }
    Ok(value)
}

/// Whether values of `ty` occupy no bytes on the wire.
fn is_zero_sized(ty: &IDLType) -> bool {
    match ty {
        IDLType::Null | IDLType::Reserved => true,
        IDLType::Record(fields) => fields.iter().all(|field| is_zero_sized(&field.ty)),
        _ => false,
    }
}
