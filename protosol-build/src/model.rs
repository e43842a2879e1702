//! Normalized declarations the Solidity emitters work from.
//!
//! Everything here is already flattened, sanitized and resolved: nested types
//! carry their synthesized top-level names, repeated `string`/`bytes` and map
//! fields point at their wrapper structs, and every field knows the exact
//! declaration it references.

use crate::descriptor::Type;

/// A declaration living in a package's Solidity library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Dotted protobuf package, possibly empty.
    pub package: String,
    /// Flattened, sanitized declaration name, e.g. `Outer_Inner`.
    pub name: String,
}

impl TypeRef {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Name of the Solidity library holding this declaration.
    pub fn namespace(&self) -> String {
        namespace(&self.package)
    }

    /// `Ns.Name`, valid from anywhere the namespace is imported.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.namespace(), self.name)
    }

    /// The library holding this declaration's codec, `Ns_NameCodec`.
    pub fn codec(&self) -> String {
        format!("{}_{}Codec", self.namespace(), self.name)
    }

    /// Spelling of this type from inside the library of `package`.
    pub fn spelled_from(&self, package: &str) -> String {
        if self.package == package {
            self.name.clone()
        } else {
            self.qualified()
        }
    }
}

/// Solidity library name for a protobuf package.
///
/// `foo.bar_baz` becomes `Foo_Bar_baz`; the empty package becomes
/// `DefaultPackage`.
pub fn namespace(package: &str) -> String {
    if package.is_empty() {
        return "DefaultPackage".to_string();
    }
    package
        .split('.')
        .map(crate::sanitize::title)
        .collect::<Vec<_>>()
        .join("_")
}

/// What a field stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A numeric, `bool`, `string` or `bytes` scalar.
    Scalar(Type),
    Enum(EnumRef),
    /// An embedded message, including synthesized wrappers.
    Message(TypeRef),
}

/// A reference to an enum together with the shape its codec depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumRef {
    pub ty: TypeRef,
    /// Largest ordinal, i.e. the number of values minus one.
    pub max: u32,
    /// Whether every value's number equals its ordinal. Enums that are not
    /// contiguous route through a companion codec library.
    pub contiguous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Name as declared in the schema.
    pub name: String,
    /// Sanitized, collision-free Solidity member name.
    pub ident: String,
    pub number: u32,
    pub kind: FieldKind,
    pub repeated: bool,
}

impl FieldDecl {
    /// Repeated non-message fields travel as one packed block.
    pub fn is_packed(&self) -> bool {
        self.repeated && !matches!(self.kind, FieldKind::Message(_))
    }

    /// The scalar type, if this is a scalar field.
    pub fn scalar(&self) -> Option<Type> {
        match self.kind {
            FieldKind::Scalar(ty) => Some(ty),
            _ => None,
        }
    }
}

/// A struct declaration, either a flattened message or a wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDecl {
    /// Fully qualified schema name with a leading dot. Wrappers get a
    /// synthesized one inside their package.
    pub fqn: String,
    pub ty: TypeRef,
    /// Fields in declaration order.
    pub fields: Vec<FieldDecl>,
}

impl MessageDecl {
    /// Fields in ascending field number order, the order they hit the wire.
    pub fn fields_by_number(&self) -> Vec<&FieldDecl> {
        let mut fields: Vec<&FieldDecl> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.number);
        fields
    }

    /// The largest declared field number, `0` for an empty message.
    pub fn max_field_number(&self) -> u32 {
        self.fields.iter().map(|f| f.number).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub fqn: String,
    pub ty: TypeRef,
    /// `(sanitized ident, number)` in declaration order.
    pub values: Vec<(String, i32)>,
}

impl EnumDecl {
    pub fn is_contiguous(&self) -> bool {
        is_contiguous(self.values.iter().map(|(_, number)| *number))
    }
}

/// Whether the numbers are exactly `0, 1, 2, ...` in order.
pub fn is_contiguous(numbers: impl IntoIterator<Item = i32>) -> bool {
    numbers
        .into_iter()
        .enumerate()
        .all(|(ordinal, number)| i32::try_from(ordinal).is_ok_and(|o| o == number))
}

/// A top-level declaration of one generated unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Enum(EnumDecl),
    Message(MessageDecl),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace() {
        assert_eq!(namespace(""), "DefaultPackage");
        assert_eq!(namespace("foo"), "Foo");
        assert_eq!(namespace("foo.bar"), "Foo_Bar");
        assert_eq!(namespace("cosmos.bank.v1beta1"), "Cosmos_Bank_V1beta1");
    }

    #[test]
    fn test_type_ref_spelling() {
        let ty = TypeRef::new("foo.bar", "Outer_Inner");
        assert_eq!(ty.qualified(), "Foo_Bar.Outer_Inner");
        assert_eq!(ty.codec(), "Foo_Bar_Outer_InnerCodec");
        assert_eq!(ty.spelled_from("foo.bar"), "Outer_Inner");
        assert_eq!(ty.spelled_from("other"), "Foo_Bar.Outer_Inner");
    }

    #[test]
    fn test_is_contiguous() {
        assert!(is_contiguous([0, 1, 2]));
        assert!(is_contiguous([]));
        assert!(!is_contiguous([0, 2]));
        assert!(!is_contiguous([1, 2]));
        assert!(!is_contiguous([0, 1, 1]));
    }

    #[test]
    fn test_fields_by_number() {
        let field = |name: &str, number| FieldDecl {
            name: name.to_string(),
            ident: name.to_string(),
            number,
            kind: FieldKind::Scalar(Type::Uint64),
            repeated: false,
        };
        let msg = MessageDecl {
            fqn: ".p.M".to_string(),
            ty: TypeRef::new("p", "M"),
            fields: vec![field("b", 2), field("a", 1), field("c", 3)],
        };
        let order: Vec<_> = msg.fields_by_number().iter().map(|f| f.number).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(msg.max_field_number(), 3);
    }
}
