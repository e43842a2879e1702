//! Descriptor types for protobuf FileDescriptorSet and the protoc plugin
//! protocol.
//!
//! These types mirror google/protobuf/descriptor.proto and
//! google/protobuf/compiler/plugin.proto, limited to the fields the
//! generator reads or writes.

mod decode;
mod encode;

pub use decode::{decode_code_generator_request, decode_file_descriptor_set};
pub use encode::encode_code_generator_response;

/// A collection of file descriptors.
/// Corresponds to google.protobuf.FileDescriptorSet.
#[derive(Debug, Clone, Default)]
pub struct FileDescriptorSet {
    /// The file descriptors.
    pub file: Vec<FileDescriptorProto>, // field 1
}

/// Describes a complete .proto file.
/// Corresponds to google.protobuf.FileDescriptorProto.
#[derive(Debug, Clone, Default)]
pub struct FileDescriptorProto {
    /// The file name, relative to root of source tree.
    pub name: Option<String>, // field 1
    /// The package name.
    pub package: Option<String>, // field 2
    /// Names of files imported by this file.
    pub dependency: Vec<String>, // field 3
    /// All top-level message definitions in this file.
    pub message_type: Vec<DescriptorProto>, // field 4
    /// All top-level enum definitions in this file.
    pub enum_type: Vec<EnumDescriptorProto>, // field 5
    /// The syntax of the proto file (e.g., "proto2", "proto3").
    pub syntax: Option<String>, // field 12
}

impl FileDescriptorProto {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn package(&self) -> &str {
        self.package.as_deref().unwrap_or("")
    }

    /// protoc leaves `syntax` unset for proto2 files.
    pub fn syntax(&self) -> &str {
        self.syntax.as_deref().unwrap_or("proto2")
    }
}

/// Describes a message type.
/// Corresponds to google.protobuf.DescriptorProto.
#[derive(Debug, Clone, Default)]
pub struct DescriptorProto {
    /// The message name.
    pub name: Option<String>, // field 1
    /// Fields of the message.
    pub field: Vec<FieldDescriptorProto>, // field 2
    /// Nested message types.
    pub nested_type: Vec<DescriptorProto>, // field 3
    /// Nested enum types.
    pub enum_type: Vec<EnumDescriptorProto>, // field 4
    /// Message options.
    pub options: Option<MessageOptions>, // field 7
    /// Oneof declarations.
    pub oneof_decl: Vec<OneofDescriptorProto>, // field 8
}

impl DescriptorProto {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Whether protoc synthesized this message for a `map<K, V>` field.
    pub fn is_map_entry(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.map_entry)
            .unwrap_or(false)
    }
}

/// Describes a field within a message.
/// Corresponds to google.protobuf.FieldDescriptorProto.
#[derive(Debug, Clone, Default)]
pub struct FieldDescriptorProto {
    /// The field name.
    pub name: Option<String>, // field 1
    /// The field number (tag).
    pub number: Option<i32>, // field 3
    /// The field label (optional, required, repeated).
    pub label: Option<i32>, // field 4
    /// The field type.
    pub r#type: Option<i32>, // field 5
    /// For message and enum types, the fully-qualified type name.
    pub type_name: Option<String>, // field 6
    /// The default value as a string.
    pub default_value: Option<String>, // field 7
    /// Field options.
    pub options: Option<FieldOptions>, // field 8
    /// If set, this field is part of a oneof.
    pub oneof_index: Option<i32>, // field 9
    /// If true, this is a proto3 optional field.
    pub proto3_optional: Option<bool>, // field 17
}

impl FieldDescriptorProto {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Get the field label.
    pub fn label(&self) -> Label {
        self.label
            .and_then(Label::from_i32)
            .unwrap_or(Label::Optional)
    }

    /// Get the field type.
    pub fn field_type(&self) -> Option<Type> {
        self.r#type.and_then(Type::from_i32)
    }

    pub fn is_repeated(&self) -> bool {
        self.label() == Label::Repeated
    }

    /// Whether `[packed = true]` was set explicitly.
    pub fn is_packed(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|o| o.packed)
            .unwrap_or(false)
    }

    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or("")
    }
}

/// Describes an enum type.
/// Corresponds to google.protobuf.EnumDescriptorProto.
#[derive(Debug, Clone, Default)]
pub struct EnumDescriptorProto {
    /// The enum name.
    pub name: Option<String>, // field 1
    /// The enum values.
    pub value: Vec<EnumValueDescriptorProto>, // field 2
}

impl EnumDescriptorProto {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// Describes an enum value.
/// Corresponds to google.protobuf.EnumValueDescriptorProto.
#[derive(Debug, Clone, Default)]
pub struct EnumValueDescriptorProto {
    /// The value name.
    pub name: Option<String>, // field 1
    /// The value number.
    pub number: Option<i32>, // field 2
}

/// Describes a oneof.
/// Corresponds to google.protobuf.OneofDescriptorProto.
#[derive(Debug, Clone, Default)]
pub struct OneofDescriptorProto {
    /// The oneof name.
    pub name: Option<String>, // field 1
}

/// Options for a message type.
/// Corresponds to google.protobuf.MessageOptions.
#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    /// Set true if this message is a map entry type.
    pub map_entry: Option<bool>, // field 7
}

/// Options for a field.
/// Corresponds to google.protobuf.FieldOptions.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    /// Whether repeated scalars use the packed encoding.
    pub packed: Option<bool>, // field 2
}

/// The input protoc hands to a plugin on stdin.
/// Corresponds to google.protobuf.compiler.CodeGeneratorRequest.
#[derive(Debug, Clone, Default)]
pub struct CodeGeneratorRequest {
    /// Files named on the protoc command line.
    pub file_to_generate: Vec<String>, // field 1
    /// The `--sol_opt` / `--sol_out=<param>:` parameter.
    pub parameter: Option<String>, // field 2
    /// Every file in `file_to_generate` and everything they import,
    /// in topological order.
    pub proto_file: Vec<FileDescriptorProto>, // field 15
}

/// The output a plugin writes to stdout.
/// Corresponds to google.protobuf.compiler.CodeGeneratorResponse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeGeneratorResponse {
    /// Set when the schema could not be compiled.
    pub error: Option<String>, // field 1
    /// Bitmask of `FEATURE_*` flags.
    pub supported_features: Option<u64>, // field 2
    pub file: Vec<ResponseFile>, // field 15
}

/// `CodeGeneratorResponse.supported_features` bit for proto3 `optional`.
pub const FEATURE_PROTO3_OPTIONAL: u64 = 1;

/// A generated file.
/// Corresponds to google.protobuf.compiler.CodeGeneratorResponse.File.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFile {
    pub name: Option<String>,    // field 1
    pub content: Option<String>, // field 15
}

/// Field type enumeration.
/// Corresponds to google.protobuf.FieldDescriptorProto.Type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Type {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Uint64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Group = 10,
    Message = 11,
    Bytes = 12,
    Uint32 = 13,
    Enum = 14,
    Sfixed32 = 15,
    Sfixed64 = 16,
    Sint32 = 17,
    Sint64 = 18,
}

impl Type {
    /// Convert from i32.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Double),
            2 => Some(Self::Float),
            3 => Some(Self::Int64),
            4 => Some(Self::Uint64),
            5 => Some(Self::Int32),
            6 => Some(Self::Fixed64),
            7 => Some(Self::Fixed32),
            8 => Some(Self::Bool),
            9 => Some(Self::String),
            10 => Some(Self::Group),
            11 => Some(Self::Message),
            12 => Some(Self::Bytes),
            13 => Some(Self::Uint32),
            14 => Some(Self::Enum),
            15 => Some(Self::Sfixed32),
            16 => Some(Self::Sfixed64),
            17 => Some(Self::Sint32),
            18 => Some(Self::Sint64),
            _ => None,
        }
    }

    /// The keyword used for this type in `.proto` source.
    pub fn proto_name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Int32 => "int32",
            Self::Fixed64 => "fixed64",
            Self::Fixed32 => "fixed32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Group => "group",
            Self::Message => "message",
            Self::Bytes => "bytes",
            Self::Uint32 => "uint32",
            Self::Enum => "enum",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
        }
    }

    /// Whether values of this type can appear in a packed block.
    pub fn is_packable(self) -> bool {
        !matches!(
            self,
            Self::String | Self::Bytes | Self::Message | Self::Group
        )
    }
}

/// Field label enumeration.
/// Corresponds to google.protobuf.FieldDescriptorProto.Label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Label {
    Optional = 1,
    Required = 2,
    Repeated = 3,
}

impl Label {
    /// Convert from i32.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Optional),
            2 => Some(Self::Required),
            3 => Some(Self::Repeated),
            _ => None,
        }
    }
}
