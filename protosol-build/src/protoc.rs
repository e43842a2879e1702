//! Running protoc to obtain a FileDescriptorSet.

use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::descriptor::{decode_file_descriptor_set, FileDescriptorSet};
use crate::Error;

/// Find the protoc executable: `PROTOC` if it points at a file, else `PATH`.
pub fn find_protoc() -> Result<PathBuf, Error> {
    if let Ok(path) = std::env::var("PROTOC") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }
    which::which("protoc").map_err(|_| Error::ProtocNotFound)
}

/// Run protoc over `protos` and decode the descriptor set it writes,
/// imports included.
pub fn invoke_protoc(
    protoc: &Path,
    protos: &[impl AsRef<Path>],
    includes: &[impl AsRef<Path>],
    extra_args: &[String],
) -> Result<FileDescriptorSet, Error> {
    let tempdir = tempfile::tempdir()?;
    let descriptor_path = tempdir.path().join("descriptor.bin");

    let mut cmd = Command::new(protoc);
    for include in includes {
        cmd.arg("-I").arg(include.as_ref());
    }
    cmd.arg("--descriptor_set_out").arg(&descriptor_path);
    cmd.arg("--include_imports");
    cmd.args(extra_args);
    for proto in protos {
        cmd.arg(proto.as_ref());
    }

    debug!(protoc = %protoc.display(), protos = protos.len(), "running protoc");
    let output = cmd.output()?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.into_owned(),
            (_, true) => stdout.into_owned(),
            _ => format!("{}\n{}", stdout, stderr),
        };
        return Err(Error::ProtocFailed(combined));
    }

    let descriptor_bytes = std::fs::read(&descriptor_path)?;
    decode_file_descriptor_set(&descriptor_bytes)
}

/// The name protoc gives `proto` in a descriptor set: its path relative to
/// the first include directory containing it, with `/` separators.
pub fn descriptor_name(proto: &Path, includes: &[impl AsRef<Path>]) -> String {
    let proto = normal_components(proto);
    let relative = includes
        .iter()
        .map(|include| normal_components(include.as_ref()))
        .find(|include| proto.starts_with(include))
        .map_or(&proto[..], |include| &proto[include.len()..]);
    relative.join("/")
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
