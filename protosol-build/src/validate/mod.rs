//! Schema rules the canonical codec depends on.
//!
//! These run on the raw descriptors of every requested file before anything
//! is lowered, so the emitters can assume a well-formed schema.

mod recursion;

pub use recursion::check_cycles;

use tracing::trace;

use crate::config::Config;
use crate::descriptor::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto, Label, Type};
use crate::Error;

/// Target enums are `uint8`-backed.
const MAX_ENUM_VALUES: usize = 256;

/// Check every rule that applies to a single file.
pub fn check_file(config: &Config, file: &FileDescriptorProto) -> Result<(), Error> {
    if file.syntax() != "proto3" {
        return Err(Error::UnsupportedSyntax {
            file: file.name().to_string(),
            syntax: file.syntax().to_string(),
        });
    }

    let scope = if file.package().is_empty() {
        String::new()
    } else {
        format!("{}.", file.package())
    };
    for enum_type in &file.enum_type {
        check_enum(config, file, &scope, enum_type)?;
    }
    for message in &file.message_type {
        check_message(config, file, &scope, message)?;
    }
    Ok(())
}

fn check_enum(
    config: &Config,
    file: &FileDescriptorProto,
    scope: &str,
    enum_type: &EnumDescriptorProto,
) -> Result<(), Error> {
    let name = format!("{}{}", scope, enum_type.name());
    let value_name = |index: usize| {
        enum_type.value[index]
            .name
            .clone()
            .unwrap_or_default()
    };

    if enum_type.value.len() > MAX_ENUM_VALUES {
        return Err(Error::invalid_enum(
            file.name(),
            &name,
            &value_name(MAX_ENUM_VALUES),
            format!("enums are limited to {} values", MAX_ENUM_VALUES),
        ));
    }

    let mut seen = std::collections::HashSet::with_capacity(enum_type.value.len());
    for (ordinal, value) in enum_type.value.iter().enumerate() {
        let number = value.number.unwrap_or(0);
        if !seen.insert(number) {
            return Err(Error::invalid_enum(
                file.name(),
                &name,
                &value_name(ordinal),
                format!("number {} is already used, aliases are not supported", number),
            ));
        }
        if config.strict_enum_validation && i64::from(number) != i64::try_from(ordinal).unwrap_or(-1) {
            return Err(Error::invalid_enum(
                file.name(),
                &name,
                &value_name(ordinal),
                format!("expected number {} but found {}", ordinal, number),
            ));
        }
    }
    Ok(())
}

fn check_message(
    config: &Config,
    file: &FileDescriptorProto,
    scope: &str,
    message: &DescriptorProto,
) -> Result<(), Error> {
    if message.is_map_entry() {
        return Ok(());
    }
    let name = format!("{}{}", scope, message.name());

    if message.field.is_empty() {
        if !message.nested_type.is_empty() || !message.enum_type.is_empty() {
            return Err(Error::invalid_message(
                file.name(),
                &name,
                "declares nested types but no fields",
            ));
        }
        if !config.allow_empty_messages {
            return Err(Error::invalid_message(file.name(), &name, "declares no fields"));
        }
    }

    for field in &message.field {
        check_field(file, &name, field)?;
    }
    check_field_numbers(config, file, &name, &message.field)?;

    let nested_scope = format!("{}.", name);
    for enum_type in &message.enum_type {
        check_enum(config, file, &nested_scope, enum_type)?;
    }
    for nested in &message.nested_type {
        check_message(config, file, &nested_scope, nested)?;
    }
    Ok(())
}

fn check_field(file: &FileDescriptorProto, message: &str, field: &FieldDescriptorProto) -> Result<(), Error> {
    let invalid = |reason: &str| Error::invalid_field(file.name(), message, field.name(), reason);

    if field.number.map_or(true, |n| n <= 0) {
        return Err(invalid("field number must be positive"));
    }
    if field.label() == Label::Required {
        return Err(invalid("required fields are not supported"));
    }
    if field.proto3_optional == Some(true) {
        return Err(invalid("proto3 optional fields are not supported"));
    }
    if field.oneof_index.is_some() {
        return Err(invalid("oneof fields are not supported"));
    }
    if field.default_value.is_some() {
        return Err(invalid("explicit default values are not supported"));
    }

    let ty = field.field_type().ok_or_else(|| invalid("unknown field type"))?;
    if ty == Type::Group {
        return Err(invalid("groups are not supported"));
    }

    if field.is_repeated() {
        match (ty.is_packable(), field.is_packed()) {
            (true, false) => {
                return Err(invalid(&format!(
                    "repeated {} fields must be declared [packed = true]",
                    ty.proto_name()
                )))
            }
            (false, true) => {
                return Err(invalid(&format!(
                    "repeated {} fields cannot be packed",
                    ty.proto_name()
                )))
            }
            _ => {}
        }
    }

    trace!(message, field = field.name(), "field passed validation");
    Ok(())
}

/// In strict mode the sorted field numbers must be exactly `1..=n`.
fn check_field_numbers(
    config: &Config,
    file: &FileDescriptorProto,
    message: &str,
    fields: &[FieldDescriptorProto],
) -> Result<(), Error> {
    if !config.strict_field_numbers {
        return Ok(());
    }

    let mut numbered: Vec<(i32, &str)> = fields
        .iter()
        .map(|f| (f.number.unwrap_or(0), f.name()))
        .collect();
    numbered.sort_unstable();

    for (expected, (number, field)) in (1..).zip(numbered) {
        if number != expected {
            return Err(Error::invalid_field(
                file.name(),
                message,
                field,
                format!("expected field number {} but found {}", expected, number),
            ));
        }
    }
    Ok(())
}
