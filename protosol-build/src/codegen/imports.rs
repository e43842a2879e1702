//! Output locations of generated units and the imports between them.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::warn;

use crate::context::{is_google_file, Schema};
use crate::descriptor::FileDescriptorProto;
use crate::sanitize::title;

/// Where the unit for `file` is written, relative to the output root.
///
/// Package segments become directories and the file keeps its base name:
/// `proto/v1/bank.proto` in package `cosmos.bank` becomes
/// `cosmos/bank/bank.sol`.
pub fn output_path(file: &FileDescriptorProto) -> String {
    let base = Path::new(file.name())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("unnamed");

    let mut path: Vec<&str> = file
        .package()
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    path.push(base);
    format!("{}.sol", path.join("/"))
}

/// Identifier derived from an output path, used to name per-unit libraries.
///
/// `cosmos/bank/bank.sol` becomes `Cosmos_Bank_Bank`.
pub fn unit_ident(output_path: &str) -> String {
    output_path
        .trim_end_matches(".sol")
        .split('/')
        .map(|segment| {
            segment
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        })
        .map(|segment| title(&segment))
        .collect::<Vec<_>>()
        .join("_")
}

/// Path of `to` as seen from the unit at `from`, both relative to the same
/// output root. The result always starts with `./` or `../`.
pub fn relative_import(from: &str, to: &str) -> String {
    let from_dirs: Vec<&str> = from.split('/').collect();
    let from_dirs = &from_dirs[..from_dirs.len().saturating_sub(1)];
    let to_parts: Vec<&str> = to.split('/').collect();
    let to_dirs = &to_parts[..to_parts.len().saturating_sub(1)];

    let common = from_dirs
        .iter()
        .zip(to_dirs)
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from_dirs.len() - common;
    let mut path = if ups == 0 {
        "./".to_string()
    } else {
        "../".repeat(ups)
    };
    path.push_str(&to_parts[common..].join("/"));
    path
}

/// Import paths of the unit for `file`: the runtime library first, then each
/// generated dependency in declaration order.
pub fn imports(schema: &Schema, file: &FileDescriptorProto) -> Vec<String> {
    let own_path = output_path(file);
    let mut seen = BTreeSet::new();
    let mut imports = vec![schema.config.protobuf_lib.clone()];

    for dependency in &file.dependency {
        if is_google_file(dependency) {
            warn!(file = file.name(), dependency = %dependency, "skipping import of well-known file");
            continue;
        }
        let Some(dep_file) = schema.file(dependency) else {
            warn!(file = file.name(), dependency = %dependency, "dependency missing from request");
            continue;
        };
        let dep_path = output_path(dep_file);
        if dep_path == own_path || !seen.insert(dep_path.clone()) {
            continue;
        }
        imports.push(relative_import(&own_path, &dep_path));
    }
    imports
}
