//! Strict decoders.
//!
//! A decoder accepts exactly the bytes the matching encoder produces: fields
//! in ascending order, no explicit default values, no empty packed blocks and
//! no trailing bytes. Every failure is reported as `(false, pos, ...)`.

use tracing::trace;

use super::{enum_ref, local_scalar, wire_type_label, StructCodec};
use crate::codegen::types::{decode_op, is_default, LIB};
use crate::codegen::writer::CodeWriter;
use crate::descriptor::Type;
use crate::model::{EnumRef, FieldDecl, FieldKind, TypeRef};
use crate::Error;

const FAIL: &str = "return (false, pos);";

/// Condition under which a `len`-byte span starting at `pos` wraps around
/// `uint64` or runs past `limit`. The subtraction form never overflows, so
/// the check cannot itself revert under checked arithmetic.
fn span_overflows(limit: Option<&str>) -> String {
    let wraps = "len > 0xFFFFFFFFFFFFFFFF - pos";
    match limit {
        Some(limit) => format!("{} || pos + len > {}", wraps, limit),
        None => wraps.to_string(),
    }
}

pub(super) fn emit(w: &mut CodeWriter, codec: &StructCodec) -> Result<(), Error> {
    emit_entry(w, codec);

    let fields = codec.decl.fields_by_number();
    if fields.is_empty() {
        return Ok(());
    }

    w.blank();
    emit_check_key(w, &fields)?;
    w.blank();
    emit_dispatch(w, codec, &fields);

    for field in fields {
        trace!(field = %field.name, number = field.number, "emitting field decoder");
        w.blank();
        w.line(codec.field_comment(field));
        match &field.kind {
            FieldKind::Message(ty) if field.repeated => emit_repeated_message(w, codec, field, ty),
            FieldKind::Message(ty) => emit_message(w, codec, field, ty),
            _ if field.is_packed() => emit_packed(w, codec, field)?,
            FieldKind::Enum(r) => emit_enum(w, codec, field, r),
            FieldKind::Scalar(Type::Bytes) => emit_bytes(w, codec, field),
            FieldKind::Scalar(ty) => emit_scalar(w, codec, field, *ty)?,
        }
    }
    Ok(())
}

/// `decode(initial_pos, buf, len)`, the loop over one message's span.
fn emit_entry(w: &mut CodeWriter, codec: &StructCodec) {
    let instance = codec.instance_type();
    let fail = "return (false, pos, instance);";

    w.open(format!(
        "function decode(uint64 initial_pos, bytes memory buf, uint64 len) internal pure returns (bool, uint64, {}) {{",
        instance
    ));
    w.line(format!("{} instance;", instance));
    w.line("uint64 pos = initial_pos;");

    let max = codec.decl.max_field_number();
    if max == 0 {
        w.line("// No fields, so the only valid encoding is the empty one.");
        w.guard("len != 0", fail);
        w.line("return (true, pos, instance);");
        w.close("}");
        return;
    }

    let monotonic = !codec.config.allow_non_monotonic_fields;
    if monotonic {
        w.line("uint64 previous_field_number = 0;");
    }
    w.blank();
    w.guard(span_overflows(None), fail);
    w.blank();
    w.open("while (pos - initial_pos < len) {");
    w.line("bool success;");
    w.line("uint64 field_number;");
    w.line(format!("{}.WireType wire_type;", LIB));
    w.line(format!(
        "(success, pos, field_number, wire_type) = {}.decode_key(pos, buf);",
        LIB
    ));
    w.guard("!success", fail);
    w.blank();
    w.guard(format!("field_number > {}", max), fail);
    if monotonic {
        w.line("// Fields appear once each, in ascending order.");
        w.guard("field_number <= previous_field_number", fail);
    }
    w.guard("!check_key(field_number, wire_type)", fail);
    w.blank();
    w.line("(success, pos) = decode_field(pos, buf, initial_pos + len, field_number, instance);");
    w.guard("!success", fail);
    if monotonic {
        w.line("previous_field_number = field_number;");
    }
    w.close("}");
    w.blank();
    w.guard("pos != initial_pos + len", fail);
    w.line("return (true, pos, instance);");
    w.close("}");
}

fn emit_check_key(w: &mut CodeWriter, fields: &[&FieldDecl]) -> Result<(), Error> {
    w.open(format!(
        "function check_key(uint64 field_number, {}.WireType wire_type) internal pure returns (bool) {{",
        LIB
    ));
    for field in fields {
        w.guard(
            format!("field_number == {}", field.number),
            format!("return wire_type == {};", wire_type_label(field)?),
        );
    }
    w.line("return false;");
    w.close("}");
    Ok(())
}

fn emit_dispatch(w: &mut CodeWriter, codec: &StructCodec, fields: &[&FieldDecl]) {
    w.open(format!(
        "function decode_field(uint64 pos, bytes memory buf, uint64 end, uint64 field_number, {} instance) internal pure returns (bool, uint64) {{",
        codec.instance_type()
    ));
    for field in fields {
        let call = if needs_end(field) {
            format!("return decode_{}(pos, buf, end, instance);", field.number)
        } else {
            format!("return decode_{}(pos, buf, instance);", field.number)
        };
        w.guard(format!("field_number == {}", field.number), call);
    }
    w.line(FAIL);
    w.close("}");
}

/// Repeated messages run until a different key, so they need the span end.
fn needs_end(field: &FieldDecl) -> bool {
    field.repeated && matches!(field.kind, FieldKind::Message(_))
}

fn open_field_decoder(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl) {
    let end = if needs_end(field) { "uint64 end, " } else { "" };
    w.open(format!(
        "function decode_{}(uint64 pos, bytes memory buf, {}{} instance) internal pure returns (bool, uint64) {{",
        field.number,
        end,
        codec.instance_type()
    ));
    w.line("bool success;");
}

fn emit_scalar(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl, ty: Type) -> Result<(), Error> {
    open_field_decoder(w, codec, field);
    w.line(format!("{} v;", local_scalar(ty)?));
    w.line(format!("(success, pos, v) = {}(pos, buf);", decode_op(ty, codec.support)?));
    w.guard("!success", FAIL);
    w.blank();
    w.line("// Defaults are never encoded.");
    w.guard(is_default(ty, "v")?, FAIL);
    w.line(format!("instance.{} = v;", field.ident));
    w.line("return (true, pos);");
    w.close("}");
    Ok(())
}

fn emit_bytes(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl) {
    open_field_decoder(w, codec, field);
    w.line("uint64 len;");
    w.line(format!("(success, pos, len) = {}.decode_length_delimited(pos, buf);", LIB));
    w.guard("!success", FAIL);
    w.blank();
    w.line("// Defaults are never encoded.");
    w.guard("len == 0", FAIL);
    w.guard(span_overflows(Some("buf.length")), FAIL);
    w.blank();
    w.line(format!("instance.{} = new bytes(len);", field.ident));
    w.open("for (uint64 i = 0; i < len; i++) {");
    w.line(format!("instance.{}[i] = buf[pos + i];", field.ident));
    w.close("}");
    w.line("pos = pos + len;");
    w.line("return (true, pos);");
    w.close("}");
}

/// Convert the wire number in `v` to an enum value and store it with
/// `assign`, failing on numbers the enum does not declare.
fn emit_enum_conversion(w: &mut CodeWriter, r: &EnumRef, assign: &str) {
    let ty = r.ty.qualified();
    if r.contiguous {
        w.guard(format!("v < 0 || v > {}", r.max), FAIL);
        w.line(format!("{} = {}(uint32(v));", assign, ty));
    } else {
        w.line(format!("{} e;", ty));
        w.line(format!("(success, e) = {}.decode(v);", r.ty.codec()));
        w.guard("!success", FAIL);
        w.line(format!("{} = e;", assign));
    }
}

fn emit_enum(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl, r: &EnumRef) {
    open_field_decoder(w, codec, field);
    w.line("int32 v;");
    w.line(format!("(success, pos, v) = {}.decode_enum(pos, buf);", LIB));
    w.guard("!success", FAIL);
    w.blank();
    w.line("// Defaults are never encoded.");
    w.guard("v == 0", FAIL);
    emit_enum_conversion(w, r, &format!("instance.{}", field.ident));
    w.line("return (true, pos);");
    w.close("}");
}

fn emit_message(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl, ty: &TypeRef) {
    open_field_decoder(w, codec, field);
    w.line("uint64 len;");
    w.line(format!("(success, pos, len) = {}.decode_embedded_message(pos, buf);", LIB));
    w.guard("!success", FAIL);
    w.blank();
    w.line("// An empty message is the default value, which is never encoded.");
    w.guard("len == 0", FAIL);
    w.blank();
    w.line(format!("{} memory nestedInstance;", ty.qualified()));
    w.line(format!(
        "(success, pos, nestedInstance) = {}.decode(pos, buf, len);",
        ty.codec()
    ));
    w.guard("!success", FAIL);
    w.line(format!("instance.{} = nestedInstance;", field.ident));
    w.line("return (true, pos);");
    w.close("}");
}

/// A packed block: count the elements, allocate, then decode them again.
fn emit_packed(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl) -> Result<(), Error> {
    // Enums are read as their wire number and converted per element.
    let (element_ty, value_ty, op) = match &field.kind {
        FieldKind::Enum(r) => (
            r.ty.qualified(),
            "int32".to_string(),
            decode_op(Type::Enum, codec.support)?,
        ),
        FieldKind::Scalar(ty) => {
            let local = local_scalar(*ty)?;
            (local.clone(), local, decode_op(*ty, codec.support)?)
        }
        FieldKind::Message(ty) => return Err(Error::UnsupportedType(format!("packed {}", ty.name))),
    };

    open_field_decoder(w, codec, field);
    w.line("uint64 len;");
    w.line(format!("(success, pos, len) = {}.decode_length_delimited(pos, buf);", LIB));
    w.guard("!success", FAIL);
    if !codec.config.allow_empty_packed_arrays {
        w.line("// An empty array is omitted, never sent as an empty block.");
        w.guard("len == 0", FAIL);
    }
    w.blank();
    w.line("uint64 initial_pos = pos;");
    w.guard(span_overflows(Some("buf.length")), FAIL);
    w.blank();
    w.line(format!("{} v;", value_ty));
    w.line("uint64 cnt = 0;");
    w.open("while (pos - initial_pos < len) {");
    w.line(format!("(success, pos, v) = {}(pos, buf);", op));
    w.guard("!success", FAIL);
    w.line("cnt += 1;");
    w.close("}");
    w.guard("pos != initial_pos + len", FAIL);
    w.blank();
    w.line(format!("instance.{} = new {}[](cnt);", field.ident, element_ty));
    w.line("pos = initial_pos;");
    w.open("for (uint64 i = 0; i < cnt; i++) {");
    w.line(format!("(success, pos, v) = {}(pos, buf);", op));
    w.guard("!success", FAIL);
    let element = format!("instance.{}[i]", field.ident);
    match enum_ref(field) {
        Some(r) => emit_enum_conversion(w, r, &element),
        None => w.line(format!("{} = v;", element)),
    }
    w.close("}");
    w.line("return (true, pos);");
    w.close("}");
    Ok(())
}

/// Repeated messages and wrappers: every element is its own record with its
/// own key. The first pass counts records up to the first foreign key, the
/// second decodes them.
fn emit_repeated_message(w: &mut CodeWriter, codec: &StructCodec, field: &FieldDecl, ty: &TypeRef) {
    let len_delimited = format!("{}.WireType.LengthDelimited", LIB);

    open_field_decoder(w, codec, field);
    w.line("uint64 initial_pos = pos;");
    w.line("uint64 len;");
    w.line("uint64 cnt = 0;");
    w.open("while (pos < end) {");
    w.line(format!("(success, pos, len) = {}.decode_embedded_message(pos, buf);", LIB));
    w.guard("!success", FAIL);
    w.guard(span_overflows(Some("end")), FAIL);
    w.line("pos += len;");
    w.line("cnt += 1;");
    w.blank();
    w.open("if (pos >= end) {");
    w.line("break;");
    w.close("}");
    w.line("uint64 next_pos;");
    w.line("uint64 field_number;");
    w.line(format!("{}.WireType wire_type;", LIB));
    w.line(format!(
        "(success, next_pos, field_number, wire_type) = {}.decode_key(pos, buf);",
        LIB
    ));
    w.guard("!success", FAIL);
    w.open(format!("if (field_number != {}) {{", field.number));
    w.line("break;");
    w.close("}");
    w.guard(format!("wire_type != {}", len_delimited), FAIL);
    w.line("pos = next_pos;");
    w.close("}");
    w.blank();
    w.line(format!(
        "instance.{} = new {}[](cnt);",
        field.ident,
        ty.qualified()
    ));
    w.line("pos = initial_pos;");
    w.open("for (uint64 i = 0; i < cnt; i++) {");
    w.line(format!("(success, pos, len) = {}.decode_embedded_message(pos, buf);", LIB));
    w.guard("!success", FAIL);
    w.line(format!("{} memory nestedInstance;", ty.qualified()));
    w.line(format!(
        "(success, pos, nestedInstance) = {}.decode(pos, buf, len);",
        ty.codec()
    ));
    w.guard("!success", FAIL);
    w.line(format!("instance.{}[i] = nestedInstance;", field.ident));
    w.blank();
    w.open("if (i < cnt - 1) {");
    w.line(format!("(success, pos, , ) = {}.decode_key(pos, buf);", LIB));
    w.guard("!success", FAIL);
    w.close("}");
    w.close("}");
    w.line("return (true, pos);");
    w.close("}");
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

    fn render(config: &Config, fields: Vec<FieldDecl>) -> String {
        let decl = MessageDecl {
            fqn: ".shop.Order".to_string(),
            ty: TypeRef::new("shop", "Order"),
            fields,
        };
        let codec = StructCodec {
            config,
            support: "Shop_Order_Support",
            decl: &decl,
        };
        let mut w = CodeWriter::new();
        emit(&mut w, &codec).unwrap();
        w.finish()
    }

    #[test]
    fn test_entry_enforces_canonical_order() {
        let out = render(
            &Config::default(),
            vec![
                field("qty", 2, FieldKind::Scalar(Type::Uint32), false),
                field("id", 1, FieldKind::Scalar(Type::Uint64), false),
            ],
        );
        assert!(out.contains(
            "function decode(uint64 initial_pos, bytes memory buf, uint64 len) internal pure returns (bool, uint64, Shop.Order memory) {"
        ));
        assert!(out.contains("if (field_number > 2) {"));
        assert!(out.contains("if (field_number <= previous_field_number) {"));
        assert!(out.contains("if (pos != initial_pos + len) {"));
        // Field routines come out in field number order.
        let one = out.find("function decode_1(").unwrap();
        let two = out.find("function decode_2(").unwrap();
        assert!(one < two);
    }

    #[test]
    fn test_span_checks_cannot_overflow() {
        let item = TypeRef::new("shop", "Item");
        let out = render(
            &Config::default(),
            vec![
                field("memo", 1, FieldKind::Scalar(Type::Bytes), false),
                field("ids", 2, FieldKind::Scalar(Type::Uint64), true),
                field("items", 3, FieldKind::Message(item), true),
            ],
        );
        // An attacker-chosen `len` must fail the decode, not revert on
        // checked `pos + len`.
        assert!(!out.contains("pos + len < pos"));
        assert!(out.contains("if (len > 0xFFFFFFFFFFFFFFFF - pos) {"));
        assert_eq!(
            out.matches("if (len > 0xFFFFFFFFFFFFFFFF - pos || pos + len > buf.length) {").count(),
            2
        );
        assert!(out.contains("if (len > 0xFFFFFFFFFFFFFFFF - pos || pos + len > end) {"));
    }

    #[test]
    fn test_non_monotonic_relaxation() {
        let mut config = Config::default();
        config.allow_non_monotonic_fields(true);
        let out = render(&config, vec![field("id", 1, FieldKind::Scalar(Type::Uint64), false)]);
        assert!(!out.contains("previous_field_number"));
    }

    #[test]
    fn test_scalar_rejects_defaults() {
        let out = render(
            &Config::default(),
            vec![
                field("id", 1, FieldKind::Scalar(Type::Uint64), false),
                field("name", 2, FieldKind::Scalar(Type::String), false),
                field("price", 3, FieldKind::Scalar(Type::Float), false),
            ],
        );
        assert!(out.contains("(success, pos, v) = ProtobufLib.decode_uint64(pos, buf);"));
        assert!(out.contains("if (v == 0) {"));
        assert!(out.contains("string memory v;"));
        assert!(out.contains("if (bytes(v).length == 0) {"));
        assert!(out.contains("(success, pos, v) = Shop_Order_Support.decode_float_scaled(pos, buf);"));
        assert!(out.contains("return wire_type == ProtobufLib.WireType.Bits32;"));
    }

    #[test]
    fn test_packed_two_pass() {
        let out = render(
            &Config::default(),
            vec![field("ids", 1, FieldKind::Scalar(Type::Sint64), true)],
        );
        assert!(out.contains("if (len == 0) {"));
        assert!(out.contains("instance.ids = new int64[](cnt);"));
        assert!(out.contains("pos = initial_pos;"));
        assert!(out.contains("return wire_type == ProtobufLib.WireType.LengthDelimited;"));

        let mut config = Config::default();
        config.allow_empty_packed_arrays(true);
        let out = render(&config, vec![field("ids", 1, FieldKind::Scalar(Type::Sint64), true)]);
        assert!(!out.contains("if (len == 0) {"));
    }

    #[test]
    fn test_enum_fields() {
        let contiguous = EnumRef {
            ty: TypeRef::new("shop", "State"),
            max: 3,
            contiguous: true,
        };
        let gapped = EnumRef {
            ty: TypeRef::new("shop", "Level"),
            max: 1,
            contiguous: false,
        };
        let out = render(
            &Config::default(),
            vec![
                field("state", 1, FieldKind::Enum(contiguous), false),
                field("levels", 2, FieldKind::Enum(gapped), true),
            ],
        );
        assert!(out.contains("if (v < 0 || v > 3) {"));
        assert!(out.contains("instance.state = Shop.State(uint32(v));"));
        assert!(out.contains("instance.levels = new Shop.Level[](cnt);"));
        assert!(out.contains("(success, e) = Shop_LevelCodec.decode(v);"));
        assert!(out.contains("instance.levels[i] = e;"));
    }

    #[test]
    fn test_repeated_messages_peek_next_key() {
        let item = TypeRef::new("shop", "Item");
        let out = render(
            &Config::default(),
            vec![
                field("items", 1, FieldKind::Message(item.clone()), true),
                field("main", 2, FieldKind::Message(item), false),
            ],
        );
        assert!(out.contains("return decode_1(pos, buf, end, instance);"));
        assert!(out.contains("return decode_2(pos, buf, instance);"));
        assert!(out.contains("if (field_number != 1) {"));
        assert!(out.contains("(success, pos, , ) = ProtobufLib.decode_key(pos, buf);"));
        assert!(out.contains("(success, pos, nestedInstance) = Shop_ItemCodec.decode(pos, buf, len);"));
    }

    #[test]
    fn test_empty_message_accepts_only_empty_span() {
        let out = render(&Config::default(), Vec::new());
        assert!(out.contains("if (len != 0) {"));
        assert!(!out.contains("check_key"));
    }
}
