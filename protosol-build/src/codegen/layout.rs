//! The package namespace: enum and struct declarations of one unit.

use tracing::trace;

use super::types::storage_type;
use super::writer::CodeWriter;
use crate::context::Unit;
use crate::model::{Decl, EnumDecl, FieldDecl, FieldKind, MessageDecl};
use crate::Error;

/// Member declared by a struct with no fields, which Solidity forbids.
pub const PLACEHOLDER: &str = "_placeholder";

/// Emit `library <Ns> { ... }` with every declaration of `unit`.
pub fn emit_namespace(w: &mut CodeWriter, unit: &Unit) -> Result<(), Error> {
    w.open(format!("library {} {{", crate::model::namespace(&unit.package)));

    let mut first = true;
    let mut separate = |w: &mut CodeWriter| {
        if !std::mem::take(&mut first) {
            w.blank();
        }
    };

    for decl in &unit.decls {
        separate(w);
        match decl {
            Decl::Enum(decl) => emit_enum(w, decl),
            Decl::Message(decl) => emit_struct(w, &unit.package, decl)?,
        }
    }
    for wrapper in unit.wrappers.values() {
        separate(w);
        emit_struct(w, &unit.package, wrapper)?;
    }

    w.close("}");
    Ok(())
}

fn emit_enum(w: &mut CodeWriter, decl: &EnumDecl) {
    trace!(name = %decl.ty.name, values = decl.values.len(), "emitting enum");
    w.open(format!("enum {} {{", decl.ty.name));
    let last = decl.values.len().saturating_sub(1);
    for (i, (ident, _)) in decl.values.iter().enumerate() {
        if i == last {
            w.line(ident);
        } else {
            w.line(format!("{},", ident));
        }
    }
    w.close("}");
}

fn emit_struct(w: &mut CodeWriter, package: &str, decl: &MessageDecl) -> Result<(), Error> {
    trace!(name = %decl.ty.name, fields = decl.fields.len(), "emitting struct");
    w.open(format!("struct {} {{", decl.ty.name));
    if decl.fields.is_empty() {
        w.line("// Empty messages still need one member; this one is never encoded.");
        w.line(format!("bool {};", PLACEHOLDER));
    }
    for field in &decl.fields {
        w.line(format!("{} {};", field_type(package, field)?, field.ident));
    }
    w.close("}");
    Ok(())
}

/// The declared type of a struct member, spelled from inside `package`.
pub fn field_type(package: &str, field: &FieldDecl) -> Result<String, Error> {
    let base = match &field.kind {
        FieldKind::Scalar(ty) => storage_type(*ty)?.to_string(),
        FieldKind::Enum(r) => r.ty.spelled_from(package),
        FieldKind::Message(ty) => ty.spelled_from(package),
    };
    Ok(if field.repeated {
        format!("{}[]", base)
    } else {
        base
    })
}
