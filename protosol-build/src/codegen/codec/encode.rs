//! Canonical encoders.
//!
//! Fields are written in ascending field number order and defaults are
//! skipped, so every value has exactly one encoding.

use tracing::trace;

use super::{encode_key, StructCodec};
use crate::codegen::types::{encode_op, LIB};
use crate::codegen::writer::CodeWriter;
use crate::descriptor::Type;
use crate::model::{EnumRef, FieldDecl, FieldKind, TypeRef};
use crate::Error;

pub(super) fn emit(w: &mut CodeWriter, codec: &StructCodec) -> Result<(), Error> {
    let instance = codec.instance_type();
    let fields = codec.decl.fields_by_number();

    if fields.is_empty() {
        w.open(format!(
            "function encode(uint64 pos, bytes memory, {}) internal pure returns (uint64) {{",
            instance
        ));
        w.line("return pos;");
        w.close("}");
        return Ok(());
    }

    w.open(format!(
        "function encode(uint64 pos, bytes memory buf, {} instance) internal pure returns (uint64) {{",
        instance
    ));
    for field in &fields {
        w.line(format!("pos = encode_{}(pos, buf, instance);", field.number));
    }
    w.line("return pos;");
    w.close("}");

    for field in fields {
        trace!(field = %field.name, number = field.number, "emitting field encoder");
        w.blank();
        w.line(codec.field_comment(field));
        w.open(format!(
            "function encode_{}(uint64 pos, bytes memory buf, {} instance) internal pure returns (uint64) {{",
            field.number, instance
        ));
        match &field.kind {
            FieldKind::Message(ty) if field.repeated => emit_repeated_message(w, codec, field, ty)?,
            FieldKind::Message(ty) => emit_message(w, codec, field, ty)?,
            _ if field.is_packed() => emit_packed(w, codec, field)?,
            FieldKind::Enum(r) => {
                w.open(format!("if (uint32(instance.{}) != 0) {{", field.ident));
                w.line(encode_key(field)?);
                w.line(encode_enum(r, &format!("instance.{}", field.ident)));
                w.close("}");
            }
            FieldKind::Scalar(ty) => {
                let value = format!("instance.{}", field.ident);
                w.open(format!("if ({}) {{", is_set(*ty, &value)));
                w.line(encode_key(field)?);
                w.line(format!(
                    "pos = {}(pos, buf, {});",
                    encode_op(*ty, codec.support)?,
                    value
                ));
                w.close("}");
            }
        }
        w.line("return pos;");
        w.close("}");
    }
    Ok(())
}

/// Condition under which a singular scalar differs from its default.
fn is_set(ty: Type, value: &str) -> String {
    match ty {
        Type::Bool => value.to_string(),
        Type::String => format!("bytes({}).length > 0", value),
        Type::Bytes => format!("{}.length > 0", value),
        _ => format!("{} != 0", value),
    }
}

/// Writes one enum value as its wire number.
fn encode_enum(r: &EnumRef, value: &str) -> String {
    let number = if r.contiguous {
        format!("int32(uint32({}))", value)
    } else {
        format!("{}.encode({})", r.ty.codec(), value)
    };
    format!("pos = {}.encode_enum(pos, buf, {});", LIB, number)
}

/// Reserve the length byte of a record. Pairs with [`backpatch`].
fn reserve(w: &mut CodeWriter) {
    w.line("uint64 len_pos = pos;");
    w.line("pos += 1;");
}

fn backpatch(codec: &StructCodec) -> String {
    format!("pos = {}.backpatch_length(len_pos, pos, buf);", codec.support)
}

fn emit_message(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl, ty: &TypeRef) -> Result<(), Error> {
    w.line("uint64 start = pos;");
    w.line(encode_key(field)?);
    reserve(w);
    w.line(format!(
        "pos = {}.encode(pos, buf, instance.{});",
        ty.codec(),
        field.ident
    ));
    w.line("// Nothing written means the default value, which is omitted.");
    w.guard("pos == len_pos + 1", "return start;");
    w.line(backpatch(codec));
    Ok(())
}

fn emit_packed(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl) -> Result<(), Error> {
    let element = format!("instance.{}[i]", field.ident);
    let write = match &field.kind {
        FieldKind::Enum(r) => encode_enum(r, &element),
        FieldKind::Scalar(ty) => format!(
            "pos = {}(pos, buf, {});",
            encode_op(*ty, codec.support)?,
            element
        ),
        FieldKind::Message(ty) => return Err(Error::UnsupportedType(format!("packed {}", ty.name))),
    };

    w.open(format!("if (instance.{}.length > 0) {{", field.ident));
    w.line(encode_key(field)?);
    reserve(w);
    w.open(format!(
        "for (uint256 i = 0; i < instance.{}.length; i++) {{",
        field.ident
    ));
    w.line(write);
    w.close("}");
    w.line(backpatch(codec));
    w.close("}");
    Ok(())
}

fn emit_repeated_message(
    w: &mut CodeWriter,
    codec: &StructCodec,
    field: &FieldDecl,
    ty: &TypeRef,
) -> Result<(), Error> {
    w.open(format!(
        "for (uint256 i = 0; i < instance.{}.length; i++) {{",
        field.ident
    ));
    w.line(encode_key(field)?);
    reserve(w);
    w.line(format!(
        "pos = {}.encode(pos, buf, instance.{}[i]);",
        ty.codec(),
        field.ident
    ));
    w.line(backpatch(codec));
    w.close("}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::MessageDecl;

    fn field(ident: &str, number: u32, kind: FieldKind, repeated: bool) -> FieldDecl {
        FieldDecl {
            name: ident.to_string(),
            ident: ident.to_string(),
            number,
            kind,
            repeated,
        }
    }

    fn render(fields: Vec<FieldDecl>) -> String {
        let config = Config::default();
        let decl = MessageDecl {
            fqn: ".shop.Order".to_string(),
            ty: TypeRef::new("shop", "Order"),
            fields,
        };
        let codec = StructCodec {
            config: &config,
            support: "Shop_Order_Support",
            decl: &decl,
        };
        let mut w = CodeWriter::new();
        emit(&mut w, &codec).unwrap();
        w.finish()
    }

    #[test]
    fn test_fields_in_number_order() {
        let out = render(vec![
            field("b", 2, FieldKind::Scalar(Type::Bool), false),
            field("a", 1, FieldKind::Scalar(Type::Int32), false),
        ]);
        assert!(out.contains(
            "    pos = encode_1(pos, buf, instance);\n    pos = encode_2(pos, buf, instance);\n"
        ));
    }

    #[test]
    fn test_defaults_are_skipped() {
        let out = render(vec![
            field("a", 1, FieldKind::Scalar(Type::Int32), false),
            field("b", 2, FieldKind::Scalar(Type::Bool), false),
            field("c", 3, FieldKind::Scalar(Type::String), false),
            field("d", 4, FieldKind::Scalar(Type::Bytes), false),
            field("e", 5, FieldKind::Scalar(Type::Double), false),
        ]);
        assert!(out.contains("if (instance.a != 0) {"));
        assert!(out.contains("if (instance.b) {"));
        assert!(out.contains("if (bytes(instance.c).length > 0) {"));
        assert!(out.contains("if (instance.d.length > 0) {"));
        assert!(out.contains("pos = ProtobufLib.encode_key(5, ProtobufLib.WireType.Bits64, pos, buf);"));
        assert!(out.contains("pos = Shop_Order_Support.encode_double_scaled(pos, buf, instance.e);"));
    }

    #[test]
    fn test_enums() {
        let state = EnumRef {
            ty: TypeRef::new("shop", "State"),
            max: 2,
            contiguous: true,
        };
        let level = EnumRef {
            ty: TypeRef::new("shop", "Level"),
            max: 1,
            contiguous: false,
        };
        let out = render(vec![
            field("state", 1, FieldKind::Enum(state), false),
            field("levels", 2, FieldKind::Enum(level), true),
        ]);
        assert!(out.contains("if (uint32(instance.state) != 0) {"));
        assert!(out.contains("pos = ProtobufLib.encode_enum(pos, buf, int32(uint32(instance.state)));"));
        assert!(out.contains(
            "pos = ProtobufLib.encode_enum(pos, buf, Shop_LevelCodec.encode(instance.levels[i]));"
        ));
    }

    #[test]
    fn test_length_delimited_records_are_backpatched() {
        let item = TypeRef::new("shop", "Item");
        let out = render(vec![
            field("ids", 1, FieldKind::Scalar(Type::Uint64), true),
            field("items", 2, FieldKind::Message(item.clone()), true),
            field("main", 3, FieldKind::Message(item), false),
        ]);
        assert_eq!(
            out.matches("pos = Shop_Order_Support.backpatch_length(len_pos, pos, buf);").count(),
            3
        );
        assert!(out.contains("if (instance.ids.length > 0) {"));
        assert!(out.contains("pos = Shop_ItemCodec.encode(pos, buf, instance.items[i]);"));
        assert!(out.contains("if (pos == len_pos + 1) {\n        return start;\n    }"));
    }

    #[test]
    fn test_empty_message() {
        let out = render(Vec::new());
        assert_eq!(
            out,
            "function encode(uint64 pos, bytes memory, Shop.Order memory) internal pure returns (uint64) {\n    return pos;\n}\n"
        );
    }
}
