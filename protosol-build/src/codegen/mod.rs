//! Solidity emission for one lowered unit.

mod codec;
mod imports;
mod layout;
mod support;
mod types;
mod writer;

use tracing::debug;

use self::codec::{emit_enum_codec, emit_struct_codec, StructCodec};
use self::imports::{output_path, unit_ident};
use self::writer::CodeWriter;
use crate::context::{Schema, Unit};
use crate::descriptor::FileDescriptorProto;
use crate::{Error, GeneratedFile};

/// Version stamped into every generated header.
const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lower and emit the unit for `file`.
pub fn generate_unit<'a>(
    schema: &Schema<'a>,
    file: &'a FileDescriptorProto,
) -> Result<GeneratedFile, Error> {
    let unit = schema.lower(file)?;
    let name = output_path(file);
    let content = emit_unit(schema, &unit, &name)?;
    debug!(file = file.name(), output = %name, bytes = content.len(), "generated unit");
    Ok(GeneratedFile { name, content })
}

fn emit_unit(schema: &Schema, unit: &Unit, path: &str) -> Result<String, Error> {
    let config = schema.config;
    let mode = config.generate_mode;
    let support = support::support_name(&unit_ident(path));
    let mut w = CodeWriter::new();

    w.line(format!(
        "// File automatically generated by protoc-gen-sol {}",
        GENERATOR_VERSION
    ));
    w.line(format!("// SPDX-License-Identifier: {}", config.license));
    w.line("pragma solidity >=0.6.0 <8.0.0;");
    w.line("pragma experimental ABIEncoderV2;");
    w.blank();
    for import in imports::imports(schema, unit.file) {
        w.line(format!("import \"{}\";", import));
    }
    w.blank();

    layout::emit_namespace(&mut w, unit)?;

    for decl in unit.enums().filter(|decl| !decl.is_contiguous()) {
        w.blank();
        emit_enum_codec(&mut w, decl, mode);
    }

    for decl in unit.structs() {
        w.blank();
        let codec = StructCodec {
            config,
            support: &support,
            decl,
        };
        emit_struct_codec(&mut w, &codec)?;
    }

    if support::needed(unit, mode) {
        w.blank();
        support::emit_support(&mut w, &support, unit, mode);
    }

    Ok(w.finish())
}
