//! Codec libraries: one per struct and one per non-contiguous enum.
//!
//! Codecs live outside the package namespace, so every type they mention is
//! spelled fully qualified.

mod decode;
mod encode;

use tracing::debug;

use super::types::{storage_type, LIB};
use super::writer::CodeWriter;
use crate::config::{Config, GenerateMode};
use crate::descriptor::Type;
use crate::model::{EnumDecl, EnumRef, FieldDecl, FieldKind, MessageDecl};
use crate::Error;

/// Everything needed to emit the codec of one struct.
pub struct StructCodec<'a> {
    pub config: &'a Config,
    /// Name of the unit's support library.
    pub support: &'a str,
    pub decl: &'a MessageDecl,
}

impl StructCodec<'_> {
    /// The struct as a memory parameter type.
    fn instance_type(&self) -> String {
        format!("{} memory", self.decl.ty.qualified())
    }

    /// `// Ns.T.field` above each per-field routine.
    fn field_comment(&self, field: &FieldDecl) -> String {
        format!("// {}.{}", self.decl.ty.qualified(), field.name)
    }
}

pub fn emit_struct_codec(w: &mut CodeWriter, codec: &StructCodec) -> Result<(), Error> {
    let mode = codec.config.generate_mode;
    debug!(
        codec = %codec.decl.ty.codec(),
        fields = codec.decl.fields.len(),
        "emitting struct codec"
    );

    w.open(format!("library {} {{", codec.decl.ty.codec()));
    if mode.decoder() {
        decode::emit(w, codec)?;
    }
    if mode.decoder() && mode.encoder() {
        w.blank();
    }
    if mode.encoder() {
        encode::emit(w, codec)?;
    }
    w.close("}");
    Ok(())
}

/// Number translation for an enum whose numbers are not its ordinals.
pub fn emit_enum_codec(w: &mut CodeWriter, decl: &EnumDecl, mode: GenerateMode) {
    let ty = decl.ty.qualified();
    debug!(codec = %decl.ty.codec(), "emitting enum codec");

    w.open(format!("library {} {{", decl.ty.codec()));
    if mode.decoder() {
        w.open(format!(
            "function decode(int32 v) internal pure returns (bool, {}) {{",
            ty
        ));
        for (ident, number) in &decl.values {
            w.guard(
                format!("v == {}", number),
                format!("return (true, {}.{});", ty, ident),
            );
        }
        w.line(format!("return (false, {}(0));", ty));
        w.close("}");
    }
    if mode.decoder() && mode.encoder() {
        w.blank();
    }
    if mode.encoder() {
        w.open(format!("function encode({} v) internal pure returns (int32) {{", ty));
        for (ident, number) in &decl.values {
            w.guard(format!("v == {}.{}", ty, ident), format!("return {};", number));
        }
        w.line("revert();");
        w.close("}");
    }
    w.close("}");
}

/// Type of a local holding one decoded scalar.
fn local_scalar(ty: Type) -> Result<String, Error> {
    let sol = storage_type(ty)?;
    Ok(match ty {
        Type::String | Type::Bytes => format!("{} memory", sol),
        _ => sol.to_string(),
    })
}

fn enum_ref(field: &FieldDecl) -> Option<&EnumRef> {
    match &field.kind {
        FieldKind::Enum(r) => Some(r),
        _ => None,
    }
}

fn wire_type_label(field: &FieldDecl) -> Result<String, Error> {
    use protosol::wire::WireType;

    let wire = match &field.kind {
        _ if field.repeated => WireType::Len,
        FieldKind::Scalar(ty) => super::types::wire_type(*ty)?,
        FieldKind::Enum(_) => WireType::Varint,
        FieldKind::Message(_) => WireType::Len,
    };
    super::types::sol_wire_type(wire)
}

/// `ProtobufLib.encode_key(...)` for a field.
fn encode_key(field: &FieldDecl) -> Result<String, Error> {
    Ok(format!(
        "pos = {}.encode_key({}, {}, pos, buf);",
        LIB,
        field.number,
        wire_type_label(field)?
    ))
}
