//! Encoder for the plugin response protoc reads from stdout.

use super::{CodeGeneratorResponse, ResponseFile};
use protosol::wire::{
    backpatch_len, encode_key, encode_len_delimited, encode_varint_field, reserve_len, WireType,
};

/// Encode a CodeGeneratorResponse into protobuf binary format.
pub fn encode_code_generator_response(response: &CodeGeneratorResponse) -> Vec<u8> {
    let mut buf = Vec::new();

    if let Some(error) = &response.error {
        encode_len_delimited(1, error.as_bytes(), &mut buf);
    }
    if let Some(features) = response.supported_features {
        encode_varint_field(2, features, &mut buf);
    }
    for file in &response.file {
        encode_key(WireType::Len, 15, &mut buf);
        let len_pos = reserve_len(&mut buf);
        encode_response_file(file, &mut buf);
        backpatch_len(&mut buf, len_pos);
    }

    buf
}

fn encode_response_file(file: &ResponseFile, buf: &mut Vec<u8>) {
    if let Some(name) = &file.name {
        encode_len_delimited(1, name.as_bytes(), buf);
    }
    if let Some(content) = &file.content {
        encode_len_delimited(15, content.as_bytes(), buf);
    }
}
