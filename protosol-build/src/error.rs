//! Error types for protosol-build.

use std::io;

/// Errors that can occur while generating Solidity from protobuf schemas.
///
/// Schema errors name the file they were found in and the offending type,
/// field or value, so the plugin can report them back through protoc.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// protoc not found.
    #[error("protoc not found. Set PROTOC env var or install protoc.")]
    ProtocNotFound,

    /// protoc invocation failed.
    #[error("protoc failed: {}", truncate(.0))]
    ProtocFailed(String),

    /// Missing OUT_DIR environment variable.
    #[error("OUT_DIR not set. Run from build.rs or set out_dir().")]
    MissingOutDir,

    /// Missing file_descriptor_set_path when skip_protoc is set.
    #[error("file_descriptor_set_path required when skip_protoc is set")]
    MissingDescriptorPath,

    /// The binary descriptor or plugin request was malformed at the wire level.
    #[error("failed to decode descriptor: {0}")]
    Wire(#[from] protosol::error::DecodeError),

    /// The binary descriptor or plugin request was structurally invalid.
    #[error("failed to decode descriptor: {0}")]
    Descriptor(String),

    /// A plugin parameter could not be parsed.
    #[error("invalid parameter `{key}`: {reason}")]
    InvalidParameter { key: String, reason: String },

    /// A documented option that has no implementation.
    #[error("unimplemented feature: {0}")]
    Unimplemented(String),

    /// A field type with no Solidity mapping.
    #[error("unsupported field type `{0}`")]
    UnsupportedType(String),

    /// A requested file is not part of the request's descriptors.
    #[error("file to generate `{0}` is missing from the request")]
    MissingFile(String),

    /// The file does not declare `syntax = "proto3"`.
    #[error("{file}: unsupported syntax `{syntax}`, only proto3 is supported")]
    UnsupportedSyntax { file: String, syntax: String },

    /// An enum breaks a value rule.
    #[error("{file}: enum {name}: value {value}: {reason}")]
    InvalidEnum {
        file: String,
        name: String,
        value: String,
        reason: String,
    },

    /// A message breaks a structural rule.
    #[error("{file}: message {name}: {reason}")]
    InvalidMessage {
        file: String,
        name: String,
        reason: String,
    },

    /// A field uses a construct the canonical codec cannot express.
    #[error("{file}: field {message}.{field}: {reason}")]
    InvalidField {
        file: String,
        message: String,
        field: String,
        reason: String,
    },

    /// Two declarations map onto the same Solidity name.
    #[error("{file}: name collision on `{name}`: {reason}")]
    NameCollision {
        file: String,
        name: String,
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid_parameter(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_field(
        file: &str,
        message: &str,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            file: file.to_string(),
            message: message.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_message(file: &str, name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            file: file.to_string(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_enum(
        file: &str,
        name: &str,
        value: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidEnum {
            file: file.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn name_collision(file: &str, name: &str, reason: impl Into<String>) -> Self {
        Self::NameCollision {
            file: file.to_string(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error describes a problem with the input schema, as
    /// opposed to the environment the generator runs in.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSyntax { .. }
                | Self::InvalidEnum { .. }
                | Self::InvalidMessage { .. }
                | Self::InvalidField { .. }
                | Self::NameCollision { .. }
                | Self::UnsupportedType(_)
                | Self::MissingFile(_)
        )
    }
}

/// Truncate very long protoc output to keep errors readable.
fn truncate(msg: &str) -> String {
    const MAX_LEN: usize = 1000;
    match msg.char_indices().nth(MAX_LEN) {
        Some((idx, _)) => format!("{}... (truncated)", &msg[..idx]),
        None => msg.to_string(),
    }
}
