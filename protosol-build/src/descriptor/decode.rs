//! Decoder for descriptors and plugin requests from protobuf binary format.

use super::*;
use crate::Error;
use bytes::Buf;
use protosol::error::DecodeError;
use protosol::leb128::LebCodec;
use protosol::wire::{decode_key, skip_field, WireType};

/// Maximum size for a single message (64MB).
/// This prevents DoS attacks from malicious input with huge length values.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Decode a FileDescriptorSet from protobuf binary data.
pub fn decode_file_descriptor_set(data: &[u8]) -> Result<FileDescriptorSet, Error> {
    let mut buf = data;
    let mut fds = FileDescriptorSet::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => fds.file.push(decode_file_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(fds)
}

/// Decode a CodeGeneratorRequest, the message protoc writes to a plugin's stdin.
pub fn decode_code_generator_request(data: &[u8]) -> Result<CodeGeneratorRequest, Error> {
    let mut buf = data;
    let mut request = CodeGeneratorRequest::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => request.file_to_generate.push(decode_string(&mut buf, wire_type)?),
            2 => request.parameter = Some(decode_string(&mut buf, wire_type)?),
            15 => request
                .proto_file
                .push(decode_file_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(request)
}

/// Decode a FileDescriptorProto.
fn decode_file_descriptor_proto(data: &[u8]) -> Result<FileDescriptorProto, Error> {
    let mut buf = data;
    let mut fdp = FileDescriptorProto::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => fdp.name = Some(decode_string(&mut buf, wire_type)?),
            2 => fdp.package = Some(decode_string(&mut buf, wire_type)?),
            3 => fdp.dependency.push(decode_string(&mut buf, wire_type)?),
            4 => fdp
                .message_type
                .push(decode_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            5 => fdp
                .enum_type
                .push(decode_enum_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            12 => fdp.syntax = Some(decode_string(&mut buf, wire_type)?),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(fdp)
}

/// Decode a DescriptorProto (message type).
fn decode_descriptor_proto(data: &[u8]) -> Result<DescriptorProto, Error> {
    let mut buf = data;
    let mut dp = DescriptorProto::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => dp.name = Some(decode_string(&mut buf, wire_type)?),
            2 => dp
                .field
                .push(decode_field_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            3 => dp
                .nested_type
                .push(decode_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            4 => dp
                .enum_type
                .push(decode_enum_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            7 => dp.options = Some(decode_message_options(take_message(&mut buf, wire_type)?)?),
            8 => dp
                .oneof_decl
                .push(decode_oneof_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(dp)
}

/// Decode a FieldDescriptorProto.
fn decode_field_descriptor_proto(data: &[u8]) -> Result<FieldDescriptorProto, Error> {
    let mut buf = data;
    let mut fdp = FieldDescriptorProto::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => fdp.name = Some(decode_string(&mut buf, wire_type)?),
            3 => fdp.number = Some(decode_varint(&mut buf, wire_type)? as i32),
            4 => fdp.label = Some(decode_varint(&mut buf, wire_type)? as i32),
            5 => fdp.r#type = Some(decode_varint(&mut buf, wire_type)? as i32),
            6 => fdp.type_name = Some(decode_string(&mut buf, wire_type)?),
            7 => fdp.default_value = Some(decode_string(&mut buf, wire_type)?),
            8 => fdp.options = Some(decode_field_options(take_message(&mut buf, wire_type)?)?),
            9 => fdp.oneof_index = Some(decode_varint(&mut buf, wire_type)? as i32),
            17 => fdp.proto3_optional = Some(decode_varint(&mut buf, wire_type)? != 0),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(fdp)
}

/// Decode FieldOptions.
fn decode_field_options(data: &[u8]) -> Result<FieldOptions, Error> {
    let mut buf = data;
    let mut opts = FieldOptions::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            2 => opts.packed = Some(decode_varint(&mut buf, wire_type)? != 0),
            // Skip all other fields, including custom option extensions
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(opts)
}

/// Decode an EnumDescriptorProto.
fn decode_enum_descriptor_proto(data: &[u8]) -> Result<EnumDescriptorProto, Error> {
    let mut buf = data;
    let mut edp = EnumDescriptorProto::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => edp.name = Some(decode_string(&mut buf, wire_type)?),
            2 => edp
                .value
                .push(decode_enum_value_descriptor_proto(take_message(&mut buf, wire_type)?)?),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(edp)
}

/// Decode an EnumValueDescriptorProto.
fn decode_enum_value_descriptor_proto(data: &[u8]) -> Result<EnumValueDescriptorProto, Error> {
    let mut buf = data;
    let mut evdp = EnumValueDescriptorProto::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => evdp.name = Some(decode_string(&mut buf, wire_type)?),
            2 => evdp.number = Some(decode_varint(&mut buf, wire_type)? as i32),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(evdp)
}

/// Decode a OneofDescriptorProto.
fn decode_oneof_descriptor_proto(data: &[u8]) -> Result<OneofDescriptorProto, Error> {
    let mut buf = data;
    let mut odp = OneofDescriptorProto::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            1 => odp.name = Some(decode_string(&mut buf, wire_type)?),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(odp)
}

/// Decode MessageOptions.
fn decode_message_options(data: &[u8]) -> Result<MessageOptions, Error> {
    let mut buf = data;
    let mut mo = MessageOptions::default();

    while buf.has_remaining() {
        let (wire_type, field_number) = decode_key(&mut buf)?;
        match field_number {
            7 => mo.map_entry = Some(decode_varint(&mut buf, wire_type)? != 0),
            _ => skip_field(wire_type, &mut buf)?,
        }
    }

    Ok(mo)
}

/// Check that a known field arrived with the wire type its schema declares.
fn expect_wire_type(actual: WireType, expected: WireType) -> Result<(), Error> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Descriptor(format!(
            "expected wire type {:?}, found {:?}",
            expected, actual
        )))
    }
}

/// Decode a varint field value.
///
/// Varints are bounded to 10 bytes by [`LebCodec`].
fn decode_varint(buf: &mut &[u8], wire_type: WireType) -> Result<u64, Error> {
    expect_wire_type(wire_type, WireType::Varint)?;
    let (value, _) = u64::decode_leb128_buf(buf)?;
    Ok(value)
}

/// Decode a length value and validate it's within bounds.
fn decode_len(buf: &mut &[u8], wire_type: WireType) -> Result<usize, Error> {
    expect_wire_type(wire_type, WireType::Len)?;
    let (len, _) = u64::decode_leb128_buf(buf)?;
    if len > MAX_MESSAGE_SIZE as u64 {
        return Err(Error::Descriptor("Message size exceeds maximum".into()));
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(DecodeError::UnexpectedEndOfBuffer.into());
    }
    Ok(len)
}

/// Split off the body of an embedded message.
fn take_message<'a>(buf: &mut &'a [u8], wire_type: WireType) -> Result<&'a [u8], Error> {
    let len = decode_len(buf, wire_type)?;
    let (msg_data, rest) = buf.split_at(len);
    *buf = rest;
    Ok(msg_data)
}

/// Decode a length-delimited string.
fn decode_string(buf: &mut &[u8], wire_type: WireType) -> Result<String, Error> {
    let data = take_message(buf, wire_type)?;
    // Validate UTF-8 before allocating
    std::str::from_utf8(data)
        .map(str::to_string)
        .map_err(|_| Error::Descriptor("Invalid UTF-8 in string field".into()))
}
