//! `protosol-build` generates Solidity structs and canonical protobuf codecs
//! from `.proto` schemas.
//!
//! Every message becomes a struct in a per-package library, and gets a codec
//! library with `decode` and `encode` routines built on the
//! `ProtobufLib` runtime. The codecs are canonical: an encoder never writes a
//! default value and always writes fields in ascending order, and a decoder
//! rejects any input the encoder would not have produced. Every value
//! therefore has exactly one encoding.
//!
//! Only a subset of proto3 is accepted: no oneofs, no `optional`, and
//! repeated numeric fields must be `[packed = true]`. By default field
//! numbers must be `1..=n` and enum values `0..n`; see [`Config`] for the
//! relaxations.
//!
//! # Example
//!
//! ```rust,no_run
//! // In build.rs
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     protosol_build::Config::new()
//!         .out_dir("contracts/proto")
//!         .license("MIT")
//!         .compile_protos(&["proto/bank.proto"], &["proto/"])?;
//!     Ok(())
//! }
//! ```
//!
//! # As a protoc plugin
//!
//! The `protoc-gen-sol` binary speaks the protoc plugin protocol:
//!
//! ```text
//! protoc --sol_out=license=MIT,generate=decoder:contracts -I proto proto/bank.proto
//! ```
//!
//! # Floating point
//!
//! `float` and `double` are stored as `int32`/`int64` scaled by `10^6`/`10^15`.
//! The conversion is the integer-only one in [`protosol::fixed_point`], and
//! each generated unit carries a Solidity copy of it.

mod codegen;
mod config;
mod context;
pub mod descriptor;
mod error;
mod model;
mod protoc;
mod sanitize;
mod validate;

pub use config::{CompileMode, Config, GenerateMode};
pub use error::Error;

use std::path::Path;

use tracing::{debug, info};

use crate::context::{is_google_file, Schema};
use crate::descriptor::{CodeGeneratorRequest, FileDescriptorProto, FileDescriptorSet};

/// One generated Solidity file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Path relative to the output root, e.g. `cosmos/bank/bank.sol`.
    pub name: String,
    pub content: String,
}

/// Generate Solidity for every file the request asks for.
///
/// The whole request is validated before anything is emitted, and the first
/// error fails the run. Output is in request order and is byte-identical
/// for identical input.
pub fn generate(
    config: &Config,
    request: &CodeGeneratorRequest,
) -> Result<Vec<GeneratedFile>, Error> {
    config.check_supported()?;

    let targets = resolve_targets(request)?;
    for file in &targets {
        validate::check_file(config, file)?;
    }

    let schema = Schema::build(config, &request.proto_file, &targets)?;

    let local: Vec<&FileDescriptorProto> = request
        .proto_file
        .iter()
        .filter(|file| !is_google_file(file.name()))
        .collect();
    let target_names: Vec<&str> = targets.iter().map(|file| file.name()).collect();
    validate::check_cycles(&local, &target_names)?;

    // Units only read the schema, so they can be emitted side by side.
    let results: Vec<Result<GeneratedFile, Error>> = std::thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|&file| {
                let schema = &schema;
                scope.spawn(move || codegen::generate_unit(schema, file))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });
    let files = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    info!(
        requested = request.file_to_generate.len(),
        generated = files.len(),
        bytes = files.iter().map(|f| f.content.len()).sum::<usize>(),
        "generated Solidity"
    );
    Ok(files)
}

/// The requested files, minus the well-known ones that have no output.
fn resolve_targets(request: &CodeGeneratorRequest) -> Result<Vec<&FileDescriptorProto>, Error> {
    let mut targets = Vec::with_capacity(request.file_to_generate.len());
    for name in &request.file_to_generate {
        if is_google_file(name) {
            debug!(file = %name, "skipping well-known file");
            continue;
        }
        let file = request
            .proto_file
            .iter()
            .find(|file| file.name() == name)
            .ok_or_else(|| Error::MissingFile(name.clone()))?;
        if !targets.iter().any(|t: &&FileDescriptorProto| t.name() == name) {
            targets.push(file);
        }
    }
    Ok(targets)
}

pub(crate) fn compile(
    config: &Config,
    protos: &[impl AsRef<Path>],
    includes: &[impl AsRef<Path>],
) -> Result<(), Error> {
    let fds = if config.skip_protoc {
        let path = config
            .file_descriptor_set_path
            .as_ref()
            .ok_or(Error::MissingDescriptorPath)?;
        let bytes = std::fs::read(path)?;
        descriptor::decode_file_descriptor_set(&bytes)?
    } else {
        let protoc_path = config
            .protoc_path
            .clone()
            .map(Ok)
            .unwrap_or_else(protoc::find_protoc)?;
        protoc::invoke_protoc(&protoc_path, protos, includes, &config.protoc_args)?
    };

    let names: Vec<String> = protos
        .iter()
        .map(|proto| protoc::descriptor_name(proto.as_ref(), includes))
        .collect();
    let names = if names.is_empty() { None } else { Some(names) };
    compile_fds(config, fds, names)
}

/// Generate from a descriptor set and write the files under the output
/// directory. Without an explicit list every non-google file is generated.
pub(crate) fn compile_fds(
    config: &Config,
    fds: FileDescriptorSet,
    file_to_generate: Option<Vec<String>>,
) -> Result<(), Error> {
    let out_dir = config
        .out_dir
        .clone()
        .or_else(|| std::env::var_os("OUT_DIR").map(Into::into))
        .ok_or(Error::MissingOutDir)?;

    let file_to_generate = file_to_generate.unwrap_or_else(|| {
        fds.file
            .iter()
            .map(|file| file.name().to_string())
            .filter(|name| !is_google_file(name))
            .collect()
    });
    let request = CodeGeneratorRequest {
        file_to_generate,
        parameter: None,
        proto_file: fds.file,
    };

    for file in generate(config, &request)? {
        let path = out_dir.join(&file.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, file.content)?;
        debug!(path = %path.display(), "wrote generated file");
    }
    Ok(())
}

/// Compile `.proto` files into Solidity with default settings.
///
/// Output goes to `OUT_DIR`.
///
/// # Arguments
/// * `protos` - Paths to `.proto` files to compile
/// * `includes` - Include paths for resolving imports
pub fn compile_protos(
    protos: &[impl AsRef<Path>],
    includes: &[impl AsRef<Path>],
) -> Result<(), Error> {
    Config::new().compile_protos(protos, includes)
}
