//! LEB128 (unsigned) and SLEB128 (signed) variable-length integers.
//!
//! Arbitrary-precision values (`nat`, `int`) go through the big-integer
//! functions; lengths, indices and field hashes use the fixed-width helpers,
//! which delegate to the `leb128` crate.
use crate::error::{CandidError, CandidResult};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};

const LOW_BITS: u8 = 0x7f;
const CONTINUATION: u8 = 0x80;
const SIGN_BIT: u8 = 0x40;

/// Encodes a natural number as LEB128.
pub fn encode_nat(value: &BigUint) -> Vec<u8> {
    let mut n = value.clone();
    let mut out = Vec::new();
    loop {
        let byte = (n.iter_u32_digits().next().unwrap_or(0) as u8) & LOW_BITS;
        n >>= 7u32;
        if n.is_zero() {
            out.push(byte);
            return out;
        }
        out.push(byte | CONTINUATION);
    }
}

/// Encodes `value` as LEB128. Negative values cannot be represented and are
/// rejected with [`CandidError::InvalidArgument`].
pub fn encode_unsigned(value: &BigInt) -> CandidResult<Vec<u8>> {
    match value.to_biguint() {
        Some(n) => Ok(encode_nat(&n)),
        None => Err(CandidError::InvalidArgument(format!(
            "cannot LEB128-encode negative value {}",
            value
        ))),
    }
}

/// Encodes `value` as SLEB128 (two's complement, sign taken from bit 6 of
/// the last group).
pub fn encode_signed(value: &BigInt) -> Vec<u8> {
    let radix = BigInt::from(128u32);
    let mut n = value.clone();
    let mut out = Vec::new();
    loop {
        // Floor remainder, always in 0..128 regardless of the sign of `n`.
        let mut rem = &n % &radix;
        if rem.sign() == Sign::Minus {
            rem += &radix;
        }
        let byte = rem.to_u8().unwrap_or(0);
        n = (n - &rem) / &radix;

        let done = (n.is_zero() && byte & SIGN_BIT == 0)
            || (n == -BigInt::one() && byte & SIGN_BIT != 0);
        if done {
            out.push(byte);
            return out;
        }
        out.push(byte | CONTINUATION);
    }
}

/// Decodes a LEB128 number from the front of `bytes`, returning the value
/// and the number of bytes consumed.
pub fn decode_unsigned(bytes: &[u8]) -> CandidResult<(BigUint, usize)> {
    let mut result = BigUint::zero();
    let mut shift = 0u64;
    for (i, byte) in bytes.iter().enumerate() {
        result |= BigUint::from(byte & LOW_BITS) << shift;
        shift += 7;
        if byte & CONTINUATION == 0 {
            return Ok((result, i + 1));
        }
    }
    Err(CandidError::TruncatedInput("LEB128 number"))
}

/// Decodes an SLEB128 number from the front of `bytes`, returning the value
/// and the number of bytes consumed.
pub fn decode_signed(bytes: &[u8]) -> CandidResult<(BigInt, usize)> {
    let mut result = BigInt::zero();
    let mut shift = 0u64;
    for (i, byte) in bytes.iter().enumerate() {
        result += BigInt::from(byte & LOW_BITS) << shift;
        shift += 7;
        if byte & CONTINUATION == 0 {
            if byte & SIGN_BIT != 0 {
                result -= BigInt::one() << shift;
            }
            return Ok((result, i + 1));
        }
    }
    Err(CandidError::TruncatedInput("SLEB128 number"))
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    // Writing into a `Vec` cannot fail.
    let _ = ::leb128::write::unsigned(&mut buf, value);
    buf
}

pub fn encode_i64(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    let _ = ::leb128::write::signed(&mut buf, value);
    buf
}

/// Decodes a LEB128 number that must fit into a `u64`.
pub fn decode_u64(bytes: &[u8]) -> CandidResult<(u64, usize)> {
    let mut rest = bytes;
    let value = ::leb128::read::unsigned(&mut rest).map_err(|e| map_read_error(e, "LEB128 u64"))?;
    Ok((value, bytes.len() - rest.len()))
}

/// Decodes an SLEB128 number that must fit into an `i64`.
pub fn decode_i64(bytes: &[u8]) -> CandidResult<(i64, usize)> {
    let mut rest = bytes;
    let value = ::leb128::read::signed(&mut rest).map_err(|e| map_read_error(e, "SLEB128 i64"))?;
    Ok((value, bytes.len() - rest.len()))
}

fn map_read_error(err: ::leb128::read::Error, what: &'static str) -> CandidError {
    match err {
        ::leb128::read::Error::IoError(_) => CandidError::TruncatedInput(what),
        ::leb128::read::Error::Overflow => CandidError::Format(format!("{} overflows", what)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn unsigned_reference_vectors() {
        assert_eq!(encode_nat(&BigUint::from(0u32)), vec![0x00]);
        assert_eq!(encode_nat(&BigUint::from(127u32)), vec![0x7f]);
        assert_eq!(encode_nat(&BigUint::from(128u32)), vec![0x80, 0x01]);
        assert_eq!(encode_nat(&BigUint::from(300u32)), vec![0xac, 0x02]);
        assert_eq!(encode_nat(&BigUint::from(624485u32)), vec![0xe5, 0x8e, 0x26]);
    }

    #[test]
    fn signed_reference_vectors() {
        let cases: [(i64, &[u8]); 8] = [
            (0, &[0x00]),
            (63, &[0x3f]),
            (64, &[0xc0, 0x00]),
            (-1, &[0x7f]),
            (-64, &[0x40]),
            (-65, &[0xbf, 0x7f]),
            (-129, &[0xff, 0x7e]),
            (-123456, &[0xc0, 0xbb, 0x78]),
        ];
        for (value, expected) in cases {
            assert_eq!(encode_signed(&BigInt::from(value)), expected, "{}", value);
            assert_eq!(encode_i64(value), expected, "{}", value);
            assert_eq!(
                decode_signed(expected).unwrap(),
                (BigInt::from(value), expected.len())
            );
        }
    }

    #[test]
    fn unsigned_300_round_trips() {
        let bytes = encode_unsigned(&BigInt::from(300)).unwrap();
        assert_eq!(decode_unsigned(&bytes).unwrap(), (BigUint::from(300u32), 2));
        assert_eq!(decode_u64(&bytes).unwrap(), (300, 2));
    }

    #[test]
    fn negative_value_is_rejected_by_unsigned_encoder() {
        assert_matches!(
            encode_unsigned(&BigInt::from(-1)),
            Err(CandidError::InvalidArgument(_))
        );
    }

    #[test]
    fn decoding_past_end_of_buffer_fails() {
        assert_matches!(decode_unsigned(&[0x80, 0x80]), Err(CandidError::TruncatedInput(_)));
        assert_matches!(decode_signed(&[]), Err(CandidError::TruncatedInput(_)));
        assert_matches!(decode_u64(&[0xff]), Err(CandidError::TruncatedInput(_)));
    }

    #[test]
    fn decode_stops_at_first_terminal_group() {
        assert_eq!(
            decode_unsigned(&[0xac, 0x02, 0xff]).unwrap(),
            (BigUint::from(300u32), 2)
        );
    }

    #[test]
    fn big_values_round_trip() {
        let big = BigInt::from(u128::MAX) * BigInt::from(u128::MAX);
        let neg = -big.clone();
        let (decoded, _) = decode_unsigned(&encode_unsigned(&big).unwrap()).unwrap();
        assert_eq!(BigInt::from(decoded), big);
        assert_eq!(decode_signed(&encode_signed(&neg)).unwrap().0, neg);
    }
}
