//! Configuration for Solidity code generation.

use std::path::{Path, PathBuf};

use crate::Error;

/// Import path used for the runtime codec library unless overridden.
pub const DEFAULT_PROTOBUF_LIB: &str = "@lazyledger/protobuf3-solidity-lib/contracts/ProtobufLib.sol";

/// How codec routines are packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// Codec routines are `internal` library functions, inlined into callers.
    #[default]
    Inline,
    /// Codec routines are deployed separately and linked. Not implemented.
    Link,
}

/// Which half of the codec to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerateMode {
    #[default]
    All,
    Decoder,
    Encoder,
}

impl GenerateMode {
    pub fn decoder(self) -> bool {
        matches!(self, Self::All | Self::Decoder)
    }

    pub fn encoder(self) -> bool {
        matches!(self, Self::All | Self::Encoder)
    }
}

/// Configuration for Solidity code generation.
///
/// Every schema rule defaults to its strict setting. The relaxations exist for
/// schemas that predate the canonical codec and trade away either the
/// simplicity of the decode loop or bijectivity of the encoding.
#[derive(Debug, Clone)]
pub struct Config {
    /// License string echoed into the SPDX header of every generated file.
    pub(crate) license: String,

    pub(crate) compile_mode: CompileMode,

    pub(crate) generate_mode: GenerateMode,

    /// Field numbers must be exactly `1..=n`.
    pub(crate) strict_field_numbers: bool,

    /// Enum values must be exactly `0..n`.
    pub(crate) strict_enum_validation: bool,

    /// Accept a zero-length packed block on decode.
    pub(crate) allow_empty_packed_arrays: bool,

    /// Skip the ascending field order check on decode.
    pub(crate) allow_non_monotonic_fields: bool,

    /// Accept messages that declare no fields and no nested types.
    pub(crate) allow_empty_messages: bool,

    /// Import path of the runtime codec library.
    pub(crate) protobuf_lib: String,

    /// Output directory for generated files.
    pub(crate) out_dir: Option<PathBuf>,

    /// Path to the protoc executable.
    pub(crate) protoc_path: Option<PathBuf>,

    /// Additional arguments for protoc.
    pub(crate) protoc_args: Vec<String>,

    /// Skip running protoc, use pre-existing FileDescriptorSet.
    pub(crate) skip_protoc: bool,

    /// Path to read the FileDescriptorSet from when protoc is skipped.
    pub(crate) file_descriptor_set_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            license: "CC0".to_string(),
            compile_mode: CompileMode::default(),
            generate_mode: GenerateMode::default(),
            strict_field_numbers: true,
            strict_enum_validation: true,
            allow_empty_packed_arrays: false,
            allow_non_monotonic_fields: false,
            allow_empty_messages: true,
            protobuf_lib: DEFAULT_PROTOBUF_LIB.to_string(),
            out_dir: None,
            protoc_path: None,
            protoc_args: Vec::new(),
            skip_protoc: false,
            file_descriptor_set_path: None,
        }
    }
}

impl Config {
    /// Create a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a Config from a protoc plugin parameter string.
    ///
    /// The parameter is a comma-separated list of `key=value` pairs, e.g.
    /// `license=MIT,generate=decoder,strict_field_numbers=false`.
    pub fn from_parameter(parameter: &str) -> Result<Self, Error> {
        let mut config = Self::default();
        for pair in parameter.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::invalid_parameter(pair, "expected `key=value`"))?;

            match key {
                "license" => config.license = value.to_string(),
                "compile" => {
                    config.compile_mode = match value {
                        "inline" | "compile" => CompileMode::Inline,
                        "link" => CompileMode::Link,
                        other => {
                            return Err(Error::invalid_parameter(
                                key,
                                format!("unknown value `{}`, expected one of <inline, link>", other),
                            ))
                        }
                    }
                }
                "generate" => {
                    config.generate_mode = match value {
                        "all" => GenerateMode::All,
                        "decoder" => GenerateMode::Decoder,
                        "encoder" => GenerateMode::Encoder,
                        other => {
                            return Err(Error::invalid_parameter(
                                key,
                                format!(
                                    "unknown value `{}`, expected one of <all, decoder, encoder>",
                                    other
                                ),
                            ))
                        }
                    }
                }
                "strict_field_numbers" => config.strict_field_numbers = parse_bool(key, value)?,
                "strict_enum_validation" => {
                    config.strict_enum_validation = parse_bool(key, value)?
                }
                "allow_empty_packed_arrays" => {
                    config.allow_empty_packed_arrays = parse_bool(key, value)?
                }
                "allow_non_monotonic_fields" => {
                    config.allow_non_monotonic_fields = parse_bool(key, value)?
                }
                "allow_empty_messages" => config.allow_empty_messages = parse_bool(key, value)?,
                "protobuf_lib" => config.protobuf_lib = value.to_string(),
                _ => return Err(Error::invalid_parameter(key, "unrecognized option")),
            }
        }
        Ok(config)
    }

    /// Set the license string for generated file headers.
    pub fn license(&mut self, license: impl Into<String>) -> &mut Self {
        self.license = license.into();
        self
    }

    pub fn compile_mode(&mut self, mode: CompileMode) -> &mut Self {
        self.compile_mode = mode;
        self
    }

    pub fn generate_mode(&mut self, mode: GenerateMode) -> &mut Self {
        self.generate_mode = mode;
        self
    }

    pub fn strict_field_numbers(&mut self, enabled: bool) -> &mut Self {
        self.strict_field_numbers = enabled;
        self
    }

    pub fn strict_enum_validation(&mut self, enabled: bool) -> &mut Self {
        self.strict_enum_validation = enabled;
        self
    }

    pub fn allow_empty_packed_arrays(&mut self, allowed: bool) -> &mut Self {
        self.allow_empty_packed_arrays = allowed;
        self
    }

    pub fn allow_non_monotonic_fields(&mut self, allowed: bool) -> &mut Self {
        self.allow_non_monotonic_fields = allowed;
        self
    }

    /// Treat a message with no fields and no nested types as a valid empty
    /// struct. When disabled every message must declare a field.
    pub fn allow_empty_messages(&mut self, allowed: bool) -> &mut Self {
        self.allow_empty_messages = allowed;
        self
    }

    /// Set the import path of the runtime codec library.
    pub fn protobuf_lib(&mut self, path: impl Into<String>) -> &mut Self {
        self.protobuf_lib = path.into();
        self
    }

    /// Set the output directory for generated Solidity files.
    pub fn out_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.out_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set path to the protoc executable.
    pub fn protoc_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.protoc_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add an argument to pass to protoc.
    pub fn protoc_arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.protoc_args.push(arg.into());
        self
    }

    /// Skip running protoc; use an existing FileDescriptorSet instead.
    pub fn skip_protoc_run(&mut self) -> &mut Self {
        self.skip_protoc = true;
        self
    }

    /// Path to read the FileDescriptorSet from when protoc is skipped.
    pub fn file_descriptor_set_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.file_descriptor_set_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reject options that are recognised but have no implementation.
    pub(crate) fn check_supported(&self) -> Result<(), Error> {
        match self.compile_mode {
            CompileMode::Inline => Ok(()),
            CompileMode::Link => Err(Error::Unimplemented("compile=link".to_string())),
        }
    }

    /// Compile `.proto` files into Solidity files.
    pub fn compile_protos(
        &self,
        protos: &[impl AsRef<Path>],
        includes: &[impl AsRef<Path>],
    ) -> Result<(), Error> {
        crate::compile(self, protos, includes)
    }

    /// Compile from an existing FileDescriptorSet.
    pub fn compile_fds(&self, fds: crate::descriptor::FileDescriptorSet) -> Result<(), Error> {
        crate::compile_fds(self, fds, None)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid_parameter(key, "must be 'true' or 'false'")),
    }
}
