use ic_candid_codec::{decode, encode, Field, IDLType, IDLValue};
use ic_principal::Principal;
use num_bigint::{BigInt, BigUint};
use proptest::prelude::*;

fn arb_primitive_type() -> impl Strategy<Value = IDLType> {
    prop_oneof![
        Just(IDLType::Null),
        Just(IDLType::Bool),
        Just(IDLType::Nat),
        Just(IDLType::Int),
        Just(IDLType::Nat8),
        Just(IDLType::Nat16),
        Just(IDLType::Nat32),
        Just(IDLType::Nat64),
        Just(IDLType::Int8),
        Just(IDLType::Int16),
        Just(IDLType::Int32),
        Just(IDLType::Int64),
        Just(IDLType::Float32),
        Just(IDLType::Float64),
        Just(IDLType::Text),
        Just(IDLType::Reserved),
        Just(IDLType::Principal),
    ]
}

fn arb_type() -> impl Strategy<Value = IDLType> {
    arb_primitive_type().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(IDLType::opt),
            inner.clone().prop_map(IDLType::vec),
            prop::collection::btree_map(any::<u32>(), inner.clone(), 0..4)
                .prop_map(|fields| IDLType::record(fields)),
            prop::collection::btree_map(any::<u32>(), inner, 1..4).prop_map(|fields| IDLType::variant(fields)),
        ]
    })
}

fn arb_value(ty: &IDLType) -> BoxedStrategy<IDLValue> {
    match ty {
        IDLType::Null => Just(IDLValue::Null).boxed(),
        IDLType::Bool => any::<bool>().prop_map(IDLValue::Bool).boxed(),
        IDLType::Nat => any::<u128>()
            .prop_map(|n| IDLValue::Nat(BigUint::from(n)))
            .boxed(),
        IDLType::Int => any::<i128>()
            .prop_map(|i| IDLValue::Int(BigInt::from(i)))
            .boxed(),
        IDLType::Nat8 => any::<u8>().prop_map(IDLValue::Nat8).boxed(),
        IDLType::Nat16 => any::<u16>().prop_map(IDLValue::Nat16).boxed(),
        IDLType::Nat32 => any::<u32>().prop_map(IDLValue::Nat32).boxed(),
        IDLType::Nat64 => any::<u64>().prop_map(IDLValue::Nat64).boxed(),
        IDLType::Int8 => any::<i8>().prop_map(IDLValue::Int8).boxed(),
        IDLType::Int16 => any::<i16>().prop_map(IDLValue::Int16).boxed(),
        IDLType::Int32 => any::<i32>().prop_map(IDLValue::Int32).boxed(),
        IDLType::Int64 => any::<i64>().prop_map(IDLValue::Int64).boxed(),
        IDLType::Float32 => (-1e6f32..1e6f32).prop_map(IDLValue::Float32).boxed(),
        IDLType::Float64 => (-1e12f64..1e12f64).prop_map(IDLValue::Float64).boxed(),
        IDLType::Text => any::<String>().prop_map(IDLValue::Text).boxed(),
        IDLType::Reserved => Just(IDLValue::Reserved).boxed(),
        IDLType::Principal => prop::collection::vec(any::<u8>(), 0..=29)
            .prop_map(|bytes| IDLValue::Principal(Principal::from_slice(&bytes)))
            .boxed(),
        IDLType::Opt(inner) => prop::option::of(arb_value(inner))
            .prop_map(|value| IDLValue::Opt(value.map(Box::new)))
            .boxed(),
        IDLType::Vec(inner) => prop::collection::vec(arb_value(inner), 0..4)
            .prop_map(IDLValue::Vec)
            .boxed(),
        IDLType::Record(fields) => {
            let labels: Vec<_> = fields.iter().map(|field| field.label.clone()).collect();
            let values: Vec<_> = fields.iter().map(|field| arb_value(&field.ty)).collect();
            values
                .prop_map(move |values| IDLValue::Record(labels.iter().cloned().zip(values).collect()))
                .boxed()
        }
        IDLType::Variant(fields) => prop::sample::select(fields.clone())
            .prop_flat_map(|field: Field| {
                arb_value(&field.ty)
                    .prop_map(move |value| IDLValue::Variant(field.label.clone(), Box::new(value)))
            })
            .boxed(),
        IDLType::Empty | IDLType::Func | IDLType::Service => {
            unreachable!("no values are generated for {}", ty)
        }
    }
}

fn arb_arguments() -> impl Strategy<Value = (Vec<IDLType>, Vec<IDLValue>)> {
    prop::collection::vec(arb_type(), 0..4).prop_flat_map(|types| {
        let values: Vec<_> = types.iter().map(arb_value).collect();
        (Just(types), values)
    })
}

proptest! {
    #[test]
    fn decoding_an_encoded_message_returns_its_arguments((types, values) in arb_arguments()) {
        let bytes = encode(&types, &values).unwrap();
        let (decoded_types, decoded_values) = decode(&bytes).unwrap();
        prop_assert_eq!(decoded_types, types);
        prop_assert_eq!(decoded_values, values);
    }

    #[test]
    fn decoding_arbitrary_bytes_never_panics(tail in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut bytes = b"DIDL".to_vec();
        bytes.extend(tail);
        let _ = decode(&bytes);
    }
}

#[test]
fn identical_argument_types_share_one_table_entry() {
    let ty = IDLType::record([("foo", IDLType::Nat)]);
    let bytes = encode(
        &[ty.clone(), ty],
        &[
            IDLValue::record([("foo", IDLValue::Nat(BigUint::from(1u32)))]),
            IDLValue::record([("foo", IDLValue::Nat(BigUint::from(2u32)))]),
        ],
    )
    .unwrap();
    assert_eq!(
        bytes,
        b"DIDL\x01\x6c\x01\x86\x8e\xb7\x02\x7d\x02\x00\x00\x01\x02".to_vec()
    );
}

#[test]
fn matches_reference_record_encoding() {
    let ty = IDLType::record([("foo", IDLType::Int), ("bar", IDLType::Bool)]);
    let value = IDLValue::record([
        ("foo", IDLValue::Int(BigInt::from(42))),
        ("bar", IDLValue::Bool(true)),
    ]);
    let bytes = encode(&[ty.clone()], &[value.clone()]).unwrap();
    assert_eq!(hex::encode(&bytes), "4449444c016c02d3e3aa027e868eb7027c0100012a");

    let (types, values) = decode(&bytes).unwrap();
    assert_eq!(types, vec![ty]);
    assert_eq!(values[0].field("foo"), value.field("foo"));
    assert_eq!(values[0].field("bar"), Some(&IDLValue::Bool(true)));
}

#[test]
fn nested_vectors_of_records_decode() {
    let ty = IDLType::vec(IDLType::record([
        ("name", IDLType::Text),
        ("owner", IDLType::opt(IDLType::Principal)),
    ]));
    let value = IDLValue::Vec(vec![
        IDLValue::record([
            ("name", IDLValue::from("a")),
            ("owner", IDLValue::some(IDLValue::Principal(Principal::anonymous()))),
        ]),
        IDLValue::record([("name", IDLValue::from("b")), ("owner", IDLValue::none())]),
    ]);
    let bytes = encode(&[ty.clone()], &[value.clone()]).unwrap();
    assert_eq!(decode(&bytes).unwrap(), (vec![ty], vec![value]));
}
