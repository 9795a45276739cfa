use crate::error::{CandidError, CandidResult};
use crate::leb128::{encode_nat, encode_signed, encode_u64, encode_unsigned};
use crate::types::{wire_order, IDLType, Label, TypeDefinitionTable, MAGIC};
use crate::value::IDLValue;

/// Encodes `values` as a Candid message with argument types `types`.
///
/// All argument types share one type table. At least as many values as
/// types are required; surplus values have no declared type and are not
/// encoded.
pub fn encode(types: &[IDLType], values: &[IDLValue]) -> CandidResult<Vec<u8>> {
    if values.len() < types.len() {
        return Err(CandidError::ArityMismatch {
            types: types.len(),
            values: values.len(),
        });
    }

    let mut table = TypeDefinitionTable::new();
    for ty in types {
        ty.add_type_definition(&mut table)?;
    }

    let mut out = MAGIC.to_vec();
    table.write(&mut out);
    out.extend(encode_u64(types.len() as u64));
    for ty in types {
        out.extend(ty.encode_type(&table)?);
    }
    for (ty, value) in types.iter().zip(values) {
        encode_value(ty, value, &mut out)?;
    }
    Ok(out)
}

/// Appends the wire encoding of `value`, which must inhabit `ty`.
pub(crate) fn encode_value(ty: &IDLType, value: &IDLValue, out: &mut Vec<u8>) -> CandidResult<()> {
    match (ty, value) {
        (IDLType::Null, IDLValue::Null) | (IDLType::Reserved, _) => {}
        (IDLType::Bool, IDLValue::Bool(b)) => out.push(u8::from(*b)),
        (IDLType::Nat, IDLValue::Nat(n)) => out.extend(encode_nat(n)),
        (IDLType::Nat, IDLValue::Int(i)) => out.extend(encode_unsigned(i)?),
        (IDLType::Int, IDLValue::Int(i)) => out.extend(encode_signed(i)),
        (IDLType::Int, IDLValue::Nat(n)) => out.extend(encode_signed(&n.clone().into())),
        (IDLType::Nat8, IDLValue::Nat8(n)) => out.push(*n),
        (IDLType::Nat16, IDLValue::Nat16(n)) => out.extend(n.to_le_bytes()),
        (IDLType::Nat32, IDLValue::Nat32(n)) => out.extend(n.to_le_bytes()),
        (IDLType::Nat64, IDLValue::Nat64(n)) => out.extend(n.to_le_bytes()),
        (IDLType::Int8, IDLValue::Int8(i)) => out.extend(i.to_le_bytes()),
        (IDLType::Int16, IDLValue::Int16(i)) => out.extend(i.to_le_bytes()),
        (IDLType::Int32, IDLValue::Int32(i)) => out.extend(i.to_le_bytes()),
        (IDLType::Int64, IDLValue::Int64(i)) => out.extend(i.to_le_bytes()),
        (IDLType::Float32, IDLValue::Float32(x)) => out.extend(x.to_le_bytes()),
        (IDLType::Float64, IDLValue::Float64(x)) => out.extend(x.to_le_bytes()),
        (IDLType::Text, IDLValue::Text(s)) => {
            out.extend(encode_u64(s.len() as u64));
            out.extend_from_slice(s.as_bytes());
        }
        (IDLType::Principal, IDLValue::Principal(p)) => {
            let bytes = p.as_slice();
            out.push(1);
            out.extend(encode_u64(bytes.len() as u64));
            out.extend_from_slice(bytes);
        }
        (IDLType::Opt(_), IDLValue::Opt(None)) => out.push(0),
        (IDLType::Opt(inner), IDLValue::Opt(Some(v))) => {
            out.push(1);
            encode_value(inner, v, out)?;
        }
        (IDLType::Vec(inner), IDLValue::Vec(items)) => {
            out.extend(encode_u64(items.len() as u64));
            for item in items {
                encode_value(inner, item, out)?;
            }
        }
        (IDLType::Record(fields), IDLValue::Record(values)) => {
            for field in wire_order(fields) {
                let field_value =
                    find_field(values, &field.label).ok_or_else(|| mismatch(ty, value))?;
                encode_value(&field.ty, field_value, out)?;
            }
        }
        (IDLType::Variant(fields), IDLValue::Variant(label, inner)) => {
            let (index, field) = wire_order(fields)
                .into_iter()
                .enumerate()
                .find(|(_, field)| field.label == *label)
                .ok_or_else(|| mismatch(ty, value))?;
            out.extend(encode_u64(index as u64));
            encode_value(&field.ty, inner, out)?;
        }
        (IDLType::Func, _) => return Err(CandidError::UnsupportedType("func")),
        (IDLType::Service, _) => return Err(CandidError::UnsupportedType("service")),
        _ => return Err(mismatch(ty, value)),
    }
    Ok(())
}

fn find_field<'a>(values: &'a [(Label, IDLValue)], label: &Label) -> Option<&'a IDLValue> {
    values
        .iter()
        .find(|(candidate, _)| candidate == label)
        .map(|(_, value)| value)
}

fn mismatch(ty: &IDLType, value: &IDLValue) -> CandidError {
    CandidError::TypeMismatch {
        ty: ty.to_string(),
        value: value.to_string(),
    }
}
