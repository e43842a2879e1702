//! Detection of recursive struct definitions.
//!
//! Protobuf messages can reference themselves, either directly:
//! ```protobuf
//! message Node {
//!   Node child = 1;
//! }
//! ```
//!
//! Or indirectly:
//! ```protobuf
//! message A {
//!   B b = 1;
//! }
//! message B {
//!   A a = 1;
//! }
//! ```
//!
//! Solidity rejects a struct that contains itself by value, so such cycles
//! are schema errors. Only singular message fields form edges: a repeated
//! field is a dynamic array, which Solidity allows to be recursive.

use std::collections::{BTreeMap, BTreeSet};

use crate::descriptor::{DescriptorProto, FileDescriptorProto, Type};
use crate::Error;

/// A singular message field, the edge of the struct containment graph.
#[derive(Debug, Clone)]
struct Edge {
    field_name: String,
    referenced_fqn: String,
}

#[derive(Debug, Default)]
struct Node {
    file_name: String,
    edges: Vec<Edge>,
}

/// Reject any cycle of singular message fields that runs through a message
/// of one of the `targets` files. `files` must cover everything the targets
/// can reach.
///
/// Messages are visited in name order so the reported field is the same on
/// every run.
pub fn check_cycles(files: &[&FileDescriptorProto], targets: &[&str]) -> Result<(), Error> {
    // message_fqn -> its singular message-typed fields
    let mut graph: BTreeMap<String, Node> = BTreeMap::new();

    for file in files {
        let prefix = if file.package().is_empty() {
            ".".to_string()
        } else {
            format!(".{}.", file.package())
        };
        for message in &file.message_type {
            collect_message_edges(&mut graph, file.name(), &prefix, message);
        }
    }

    let roots = graph
        .iter()
        .filter(|(_, node)| targets.contains(&node.file_name.as_str()))
        .map(|(fqn, _)| fqn);
    for message_fqn in roots {
        let mut in_path = BTreeSet::new();
        in_path.insert(message_fqn.as_str());
        if let Some((owner, edge)) = dfs_find_cycle(&graph, message_fqn, message_fqn, &mut in_path) {
            let file = graph.get(owner).map(|n| n.file_name.as_str()).unwrap_or_default();
            return Err(Error::invalid_field(
                file,
                owner.trim_start_matches('.'),
                &edge.field_name,
                format!(
                    "`{}` contains itself through singular message fields",
                    edge.referenced_fqn.trim_start_matches('.')
                ),
            ));
        }
    }
    Ok(())
}

/// Recursively collect edges from a message and its nested messages.
fn collect_message_edges(
    graph: &mut BTreeMap<String, Node>,
    file_name: &str,
    prefix: &str,
    message: &DescriptorProto,
) {
    if message.is_map_entry() {
        return;
    }
    let message_fqn = format!("{}{}", prefix, message.name());

    let edges = message
        .field
        .iter()
        .filter(|f| f.field_type() == Some(Type::Message) && !f.is_repeated())
        .map(|f| Edge {
            field_name: f.name().to_string(),
            referenced_fqn: f.type_name().to_string(),
        })
        .collect();

    graph.insert(
        message_fqn.clone(),
        Node {
            file_name: file_name.to_string(),
            edges,
        },
    );

    let nested_prefix = format!("{}.", message_fqn);
    for nested in &message.nested_type {
        collect_message_edges(graph, file_name, &nested_prefix, nested);
    }
}

/// DFS looking for a path from `current` back to `target`. Returns the
/// message and field that close the cycle.
fn dfs_find_cycle<'g>(
    graph: &'g BTreeMap<String, Node>,
    current: &'g str,
    target: &str,
    in_path: &mut BTreeSet<&'g str>,
) -> Option<(&'g str, &'g Edge)> {
    let node = graph.get(current)?;

    for edge in &node.edges {
        if edge.referenced_fqn == target {
            return Some((current, edge));
        }
        if !in_path.insert(edge.referenced_fqn.as_str()) {
            continue;
        }
        let found = dfs_find_cycle(graph, &edge.referenced_fqn, target, in_path);
        in_path.remove(edge.referenced_fqn.as_str());
        if found.is_some() {
            return found;
        }
    }
    None
}
