//! Mapping of protobuf field types onto Solidity storage types and runtime
//! library routines.
//!
//! `float` and `double` are stored as scaled integers (see
//! [`protosol::fixed_point`]) and go through the unit's support library
//! rather than the runtime library.

use protosol::wire::WireType;

use crate::descriptor::Type;
use crate::Error;

/// Name of the runtime codec library every unit imports.
pub const LIB: &str = "ProtobufLib";

fn unsupported(ty: Type) -> Error {
    Error::UnsupportedType(ty.proto_name().to_string())
}

/// The Solidity type a scalar is stored as.
pub fn storage_type(ty: Type) -> Result<&'static str, Error> {
    let sol = match ty {
        Type::Double => "int64",
        Type::Float => "int32",
        Type::Int64 => "int64",
        Type::Uint64 => "uint64",
        Type::Int32 => "int32",
        Type::Fixed64 => "uint64",
        Type::Fixed32 => "uint32",
        Type::Bool => "bool",
        Type::String => "string",
        Type::Bytes => "bytes",
        Type::Uint32 => "uint32",
        Type::Sfixed32 => "int32",
        Type::Sfixed64 => "int64",
        Type::Sint32 => "int32",
        Type::Sint64 => "int64",
        Type::Group | Type::Message | Type::Enum => return Err(unsupported(ty)),
    };
    Ok(sol)
}

/// The wire type a single, unpacked value of `ty` is encoded with.
pub fn wire_type(ty: Type) -> Result<WireType, Error> {
    match ty {
        Type::Enum
        | Type::Int32
        | Type::Int64
        | Type::Uint32
        | Type::Uint64
        | Type::Sint32
        | Type::Sint64
        | Type::Bool => Ok(WireType::Varint),
        Type::Fixed64 | Type::Sfixed64 | Type::Double => Ok(WireType::I64),
        Type::String | Type::Bytes | Type::Message => Ok(WireType::Len),
        Type::Fixed32 | Type::Sfixed32 | Type::Float => Ok(WireType::I32),
        Type::Group => Err(unsupported(ty)),
    }
}

/// The runtime library's name for a wire type.
pub fn sol_wire_type(wire_type: WireType) -> Result<String, Error> {
    let variant = match wire_type {
        WireType::Varint => "Varint",
        WireType::I64 => "Bits64",
        WireType::Len => "LengthDelimited",
        WireType::I32 => "Bits32",
        WireType::SGroup | WireType::EGroup => return Err(unsupported(Type::Group)),
    };
    Ok(format!("{}.WireType.{}", LIB, variant))
}

/// The routine reading one value of `ty`.
///
/// It is called as `(success, pos, v) = op(pos, buf)`. For `bytes` and
/// messages it yields the payload length, leaving the cursor at the payload.
pub fn decode_op(ty: Type, support: &str) -> Result<String, Error> {
    let op = match ty {
        Type::Double => return Ok(format!("{}.decode_double_scaled", support)),
        Type::Float => return Ok(format!("{}.decode_float_scaled", support)),
        Type::Int64 => "decode_int64",
        Type::Uint64 => "decode_uint64",
        Type::Int32 => "decode_int32",
        Type::Fixed64 => "decode_fixed64",
        Type::Fixed32 => "decode_fixed32",
        Type::Bool => "decode_bool",
        Type::String => "decode_string",
        Type::Bytes => "decode_length_delimited",
        Type::Uint32 => "decode_uint32",
        Type::Enum => "decode_enum",
        Type::Sfixed32 => "decode_sfixed32",
        Type::Sfixed64 => "decode_sfixed64",
        Type::Sint32 => "decode_sint32",
        Type::Sint64 => "decode_sint64",
        Type::Message => "decode_embedded_message",
        Type::Group => return Err(unsupported(ty)),
    };
    Ok(format!("{}.{}", LIB, op))
}

/// The routine writing one value of `ty`, called as
/// `pos = op(pos, buf, value)`.
pub fn encode_op(ty: Type, support: &str) -> Result<String, Error> {
    let op = match ty {
        Type::Double => return Ok(format!("{}.encode_double_scaled", support)),
        Type::Float => return Ok(format!("{}.encode_float_scaled", support)),
        Type::Int64 => "encode_int64",
        Type::Uint64 => "encode_uint64",
        Type::Int32 => "encode_int32",
        Type::Fixed64 => "encode_fixed64",
        Type::Fixed32 => "encode_fixed32",
        Type::Bool => "encode_bool",
        Type::String => "encode_string",
        Type::Bytes => "encode_bytes",
        Type::Uint32 => "encode_uint32",
        Type::Enum => "encode_enum",
        Type::Sfixed32 => "encode_sfixed32",
        Type::Sfixed64 => "encode_sfixed64",
        Type::Sint32 => "encode_sint32",
        Type::Sint64 => "encode_sint64",
        Type::Message | Type::Group => return Err(unsupported(ty)),
    };
    Ok(format!("{}.{}", LIB, op))
}

/// Condition under which a decoded value of `ty` in `v` is the default.
pub fn is_default(ty: Type, v: &str) -> Result<String, Error> {
    let check = match ty {
        Type::Bool => format!("{} == false", v),
        Type::String => format!("bytes({}).length == 0", v),
        Type::Bytes => format!("{}.length == 0", v),
        Type::Group | Type::Message | Type::Enum => return Err(unsupported(ty)),
        _ => format!("{} == 0", v),
    };
    Ok(check)
}
