use crate::error::{CandidError, CandidResult};
use crate::leb128;
use num_bigint::{BigInt, BigUint};

/// A cursor over an untrusted input buffer. Every read is bounds-checked and
/// reports [`CandidError::TruncatedInput`] instead of panicking.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.position..]
    }

    pub fn read_byte(&mut self, what: &'static str) -> CandidResult<u8> {
        let byte = *self
            .rest()
            .first()
            .ok_or(CandidError::TruncatedInput(what))?;
        self.position += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize, what: &'static str) -> CandidResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(CandidError::TruncatedInput(what));
        }
        let bytes = &self.rest()[..len];
        self.position += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self, what: &'static str) -> CandidResult<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N, what)?);
        Ok(array)
    }

    pub fn read_nat(&mut self) -> CandidResult<BigUint> {
        let (value, consumed) = leb128::decode_unsigned(self.rest())?;
        self.position += consumed;
        Ok(value)
    }

    pub fn read_int(&mut self) -> CandidResult<BigInt> {
        let (value, consumed) = leb128::decode_signed(self.rest())?;
        self.position += consumed;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> CandidResult<u64> {
        let (value, consumed) = leb128::decode_u64(self.rest())?;
        self.position += consumed;
        Ok(value)
    }

    pub fn read_i64(&mut self) -> CandidResult<i64> {
        let (value, consumed) = leb128::decode_i64(self.rest())?;
        self.position += consumed;
        Ok(value)
    }

    /// Reads a LEB128 length or count.
    pub fn read_len(&mut self, what: &'static str) -> CandidResult<usize> {
        let len = self.read_u64()?;
        usize::try_from(len).map_err(|_| CandidError::Format(format!("{} {} is too large", what, len)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn tracks_position_across_reads() {
        let mut reader = Reader::new(&[0xac, 0x02, 0x7f, 1, 2, 3]);
        assert_eq!(reader.read_u64().unwrap(), 300);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_i64().unwrap(), -1);
        assert_eq!(reader.read_bytes(2, "payload").unwrap(), &[1, 2]);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_byte("tail").unwrap(), 3);
        assert!(reader.is_empty());
    }

    #[test]
    fn reads_past_the_end_fail() {
        let mut reader = Reader::new(&[1, 2]);
        assert_matches!(reader.read_bytes(3, "blob"), Err(CandidError::TruncatedInput("blob")));
        assert_matches!(reader.read_array::<4>("float"), Err(CandidError::TruncatedInput(_)));
        reader.read_bytes(2, "blob").unwrap();
        assert_matches!(reader.read_byte("tag"), Err(CandidError::TruncatedInput("tag")));
    }
}
