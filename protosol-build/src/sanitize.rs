//! Mapping of schema identifiers onto Solidity identifiers.
//!
//! Solidity reserves far more words than protobuf does, and treats every
//! `intN`/`uintN`/`bytesN` spelling as a type name. Offending identifiers are
//! escaped by prefixing `_`. An identifier that already starts with `_` is
//! considered escaped and passes through unchanged.

use std::collections::HashSet;

/// Keywords, reserved words and elementary type names of Solidity.
///
/// Sized integer and fixed-size byte types are matched structurally by
/// [`is_sized_type_name`] rather than listed here.
const RESERVED: &[&str] = &[
    "abi", "abstract", "addmod", "address", "after", "alias", "anonymous", "apply", "assembly", "assert",
    "auto", "block", "blockhash", "bool", "break", "byte", "bytes", "calldata", "case", "catch", "constant",
    "constructor", "continue", "contract", "copyof", "days", "default", "define", "delete", "do",
    "ecrecover", "else", "emit", "enum", "error", "ether", "event", "external", "fallback", "false", "final",
    "finney", "fixed", "for", "from", "function", "gasleft", "global", "gwei", "hex", "hours",
    "if", "immutable", "implements", "import", "in", "indexed", "inline", "int", "interface",
    "internal", "is", "keccak256", "let", "library", "macro", "mapping", "match", "memory",
    "minutes", "modifier", "msg", "mulmod", "mutable", "new", "nonpayable", "now", "null", "of", "override", "package",
    "partial", "payable", "pragma", "private", "promise", "public", "pure", "receive",
    "reference", "relocatable", "require", "ripemd160", "return", "returns", "revert", "sealed", "seconds",
    "selector", "self", "selfdestruct", "sha256", "sizeof", "static", "storage", "string",
    "struct", "super", "supports", "switch", "szabo", "this", "throw", "transient", "true",
    "try", "tx", "type", "typedef", "typeof", "ufixed", "uint", "unchecked", "unicode", "using",
    "var", "view", "virtual", "weeks", "wei", "while", "years",
];

/// Map an identifier onto one that is safe to use in Solidity.
pub fn sanitize(ident: &str) -> String {
    if ident.starts_with('_') {
        return ident.to_string();
    }
    // Reserved words match regardless of case.
    let lower = ident.to_ascii_lowercase();
    let escape = RESERVED.contains(&lower.as_str())
        || is_sized_type_name(&lower)
        || ident.starts_with(|c: char| c.is_ascii_digit());
    if escape {
        format!("_{}", ident)
    } else {
        ident.to_string()
    }
}

/// Whether `ident` spells a sized elementary type such as `uint40`, `bytes32`
/// or the legacy `byte4`.
fn is_sized_type_name(ident: &str) -> bool {
    ["uint", "int", "bytes", "byte"].iter().any(|prefix| {
        ident
            .strip_prefix(prefix)
            .is_some_and(|width| !width.is_empty() && width.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Sanitize a list of sibling identifiers and make the result pairwise unique.
///
/// The first occurrence of a sanitized name keeps it. Later duplicates get a
/// numeric suffix, `_name_1`, `_name_2`, ..., skipping any candidate that is
/// already used by a sibling anywhere in the list.
pub fn unique_names<'a>(idents: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let sanitized: Vec<String> = idents.into_iter().map(sanitize).collect();
    let reserved: HashSet<&str> = sanitized.iter().map(String::as_str).collect();

    let mut taken: HashSet<String> = HashSet::with_capacity(sanitized.len());
    let mut result = Vec::with_capacity(sanitized.len());
    for name in &sanitized {
        if taken.insert(name.clone()) {
            result.push(name.clone());
            continue;
        }

        let base = name.trim_start_matches('_');
        let mut suffix = 1usize;
        let unique = loop {
            let candidate = format!("_{}_{}", base, suffix);
            if !reserved.contains(candidate.as_str()) && !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        tracing::trace!(original = %name, renamed = %unique, "resolved identifier collision");
        taken.insert(unique.clone());
        result.push(unique);
    }
    result
}

/// Capitalise the first character, leaving the rest untouched.
///
/// `my_tags` becomes `My_tags`.
pub fn title(ident: &str) -> String {
    let mut chars = ident.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
