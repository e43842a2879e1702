use core::fmt;

/// Reason a key failed to decode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InvalidKeyReason {
    EmptyBuffer,
    TagOutOfRange,
}

impl fmt::Display for InvalidKeyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidKeyReason::EmptyBuffer => write!(f, "empty buffer"),
            InvalidKeyReason::TagOutOfRange => write!(f, "tag out of range"),
        }
    }
}

/// Errors produced while reading the protobuf wire format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    InvalidWireType { value: u8 },
    InvalidKey { reason: InvalidKeyReason },
    InvalidVarInt,
    UnexpectedEndOfBuffer,
    DeprecatedGroupEncoding,
    LengthOverflow { value: u64 },
}

impl DecodeError {
    pub(crate) fn invalid_wire_type(value: u8) -> Self {
        DecodeError::InvalidWireType { value }
    }

    pub(crate) fn invalid_key(reason: InvalidKeyReason) -> Self {
        DecodeError::InvalidKey { reason }
    }

    pub(crate) fn invalid_varint() -> Self {
        DecodeError::InvalidVarInt
    }

    pub(crate) fn unexpected_end_of_buffer() -> Self {
        DecodeError::UnexpectedEndOfBuffer
    }

    pub(crate) fn deprecated_group_encoding() -> Self {
        DecodeError::DeprecatedGroupEncoding
    }

    pub(crate) fn length_overflow(value: u64) -> Self {
        DecodeError::LengthOverflow { value }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidWireType { value } => {
                write!(f, "invalid 'wire type' value: {value}")
            }
            DecodeError::InvalidKey { reason } => {
                write!(f, "invalid key: '{reason}'")
            }
            DecodeError::InvalidVarInt => {
                write!(f, "invalid leb128 varint")
            }
            DecodeError::UnexpectedEndOfBuffer => {
                write!(f, "unexpected end of buffer")
            }
            DecodeError::DeprecatedGroupEncoding => {
                write!(f, "deprecated group encoding not supported")
            }
            DecodeError::LengthOverflow { value } => {
                write!(
                    f,
                    "length prefix {value} exceeds platform addressable memory"
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}
