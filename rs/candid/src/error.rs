use thiserror::Error;

/// Errors produced while encoding or decoding Candid messages.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum CandidError {
    /// A value was handed to an encoder that cannot represent it, e.g. a
    /// negative number for the unsigned LEB128 encoding.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The message is structurally malformed.
    #[error("malformed message: {0}")]
    Format(String),

    #[error("message does not start with the DIDL magic bytes")]
    MagicMismatch,

    #[error("unexpected end of input while reading {0}")]
    TruncatedInput(&'static str),

    #[error("{0} bytes left over after decoding the last value")]
    TrailingBytes(usize),

    /// A type reference points outside the type table, at a composite
    /// opcode, or back at a type that is still being resolved.
    #[error("unknown type index {0}")]
    UnknownTypeIndex(i64),

    #[error("unsupported type: {0}")]
    UnsupportedType(&'static str),

    #[error("expected at least {types} values for {types} argument types, got {values}")]
    ArityMismatch { types: usize, values: usize },

    #[error("value {value} does not inhabit type {ty}")]
    TypeMismatch { ty: String, value: String },
}

pub type CandidResult<T> = Result<T, CandidError>;
