//! Schema registries and per-unit lowering.
//!
//! [`Schema`] is built once per run from every file in the request and is
//! read-only afterwards. It knows every declared message and enum under its
//! flattened Solidity name, every map entry protoc synthesized, and every
//! wrapper struct the requested files need.
//!
//! [`Schema::lower`] turns one file into a [`Unit`]. All state that grows
//! while walking a file lives in the `Unit`, so files can be lowered from
//! several threads at once.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::config::Config;
use crate::descriptor::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto, Type};
use crate::model::{Decl, EnumDecl, EnumRef, FieldDecl, FieldKind, MessageDecl, TypeRef};
use crate::sanitize::{sanitize, title, unique_names};
use crate::Error;

/// Files under these prefixes are well-known imports with no Solidity
/// counterpart.
const GOOGLE_PREFIXES: &[&str] = &["google/protobuf/", "google/api/"];

/// Whether the file is one of protobuf's well-known files.
pub fn is_google_file(name: &str) -> bool {
    GOOGLE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Information about a type in the registry.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// The file this type is defined in.
    pub file: String,
    /// Flattened Solidity name and package.
    pub ty: TypeRef,
    pub kind: TypeKind,
    /// Defined in a well-known google file.
    pub google: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Message,
    Enum { max: u32, contiguous: bool },
}

/// The two fields of a protoc-synthesized `map<K, V>` entry message.
#[derive(Debug, Clone, Copy)]
struct MapEntry<'a> {
    key: &'a FieldDescriptorProto,
    value: &'a FieldDescriptorProto,
}

/// Read-only registries shared by every unit of a run.
pub struct Schema<'a> {
    pub config: &'a Config,
    /// Fully-qualified proto type name -> type info.
    types: HashMap<String, TypeInfo>,
    /// `(package, flat name)` -> fully-qualified name of the declaration.
    declared: HashMap<(String, String), String>,
    /// Fully-qualified map entry name -> its key and value fields.
    map_entries: HashMap<String, MapEntry<'a>>,
    /// Package -> wrapper name -> wrapper struct.
    wrappers: HashMap<String, BTreeMap<String, MessageDecl>>,
    files: HashMap<&'a str, &'a FileDescriptorProto>,
}

/// The lowered form of one `.proto` file.
#[derive(Debug)]
pub struct Unit<'a> {
    pub file: &'a FileDescriptorProto,
    pub package: String,
    /// Enums and structs, nested declarations before their parent.
    pub decls: Vec<Decl>,
    /// Wrapper structs referenced by this file, by name.
    pub wrappers: BTreeMap<String, MessageDecl>,
    pub uses_float: bool,
    pub uses_double: bool,
}

impl Unit<'_> {
    /// Every struct of the unit: declared messages, then wrappers by name.
    pub fn structs(&self) -> impl Iterator<Item = &MessageDecl> {
        self.decls
            .iter()
            .filter_map(|decl| match decl {
                Decl::Message(msg) => Some(msg),
                Decl::Enum(_) => None,
            })
            .chain(self.wrappers.values())
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Enum(decl) => Some(decl),
            Decl::Message(_) => None,
        })
    }

    fn note_field(&mut self, field: &FieldDecl) {
        match field.scalar() {
            Some(Type::Float) => self.uses_float = true,
            Some(Type::Double) => self.uses_double = true,
            _ => {}
        }
    }
}

/// `.pkg` for a package, the empty string for the root package.
fn package_scope(package: &str) -> String {
    if package.is_empty() {
        String::new()
    } else {
        format!(".{}", package)
    }
}

fn flat_name(flat_scope: &str, name: &str) -> String {
    if flat_scope.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", flat_scope, name)
    }
}

/// Wrapper for the elements of a repeated `string`/`bytes` field.
pub fn list_wrapper_name(field: &str) -> String {
    format!("{}List", title(field))
}

/// Wrapper for the entries of a map field.
pub fn entry_wrapper_name(field: &str) -> String {
    format!("{}Entry", title(field))
}

impl<'a> Schema<'a> {
    /// Register every type of `files` and build the wrappers `targets` need.
    pub fn build(
        config: &'a Config,
        files: &'a [FileDescriptorProto],
        targets: &[&'a FileDescriptorProto],
    ) -> Result<Self, Error> {
        let mut schema = Self {
            config,
            types: HashMap::new(),
            declared: HashMap::new(),
            map_entries: HashMap::new(),
            wrappers: HashMap::new(),
            files: files.iter().map(|file| (file.name(), file)).collect(),
        };

        for file in files {
            schema.register_file(file)?;
        }
        for file in targets {
            schema.register_wrappers(file)?;
        }

        debug!(
            types = schema.types.len(),
            map_entries = schema.map_entries.len(),
            wrappers = schema.wrappers.values().map(BTreeMap::len).sum::<usize>(),
            "built schema registry"
        );
        Ok(schema)
    }

    /// Look up a file of the request by name.
    pub fn file(&self, name: &str) -> Option<&'a FileDescriptorProto> {
        self.files.get(name).copied()
    }

    /// Look up a wrapper struct.
    pub fn wrapper(&self, package: &str, name: &str) -> Option<&MessageDecl> {
        self.wrappers.get(package).and_then(|w| w.get(name))
    }

    fn register_file(&mut self, file: &'a FileDescriptorProto) -> Result<(), Error> {
        let google = is_google_file(file.name());
        let scope = package_scope(file.package());
        debug!(file = file.name(), google, "registering types");

        for enum_type in &file.enum_type {
            self.register_enum(file, google, &scope, "", enum_type)?;
        }
        for message in &file.message_type {
            self.register_message(file, google, &scope, "", message)?;
        }
        Ok(())
    }

    fn register_message(
        &mut self,
        file: &'a FileDescriptorProto,
        google: bool,
        scope: &str,
        flat_scope: &str,
        message: &'a DescriptorProto,
    ) -> Result<(), Error> {
        let fqn = format!("{}.{}", scope, message.name());

        if message.is_map_entry() {
            let key = message.field.iter().find(|f| f.number == Some(1));
            let value = message.field.iter().find(|f| f.number == Some(2));
            let (Some(key), Some(value)) = (key, value) else {
                return Err(Error::invalid_message(
                    file.name(),
                    &fqn,
                    "map entry must declare a key (1) and a value (2)",
                ));
            };
            self.map_entries.insert(fqn, MapEntry { key, value });
            return Ok(());
        }

        let flat = flat_name(flat_scope, message.name());
        self.declare(file, google, &fqn, &flat, TypeKind::Message)?;

        for enum_type in &message.enum_type {
            self.register_enum(file, google, &fqn, &flat, enum_type)?;
        }
        for nested in &message.nested_type {
            self.register_message(file, google, &fqn, &flat, nested)?;
        }
        Ok(())
    }

    fn register_enum(
        &mut self,
        file: &FileDescriptorProto,
        google: bool,
        scope: &str,
        flat_scope: &str,
        enum_type: &EnumDescriptorProto,
    ) -> Result<(), Error> {
        let fqn = format!("{}.{}", scope, enum_type.name());
        let flat = flat_name(flat_scope, enum_type.name());
        let numbers = enum_type.value.iter().map(|v| v.number.unwrap_or(0));
        let kind = TypeKind::Enum {
            max: u32::try_from(enum_type.value.len().saturating_sub(1)).unwrap_or(u32::MAX),
            contiguous: crate::model::is_contiguous(numbers),
        };
        self.declare(file, google, &fqn, &flat, kind)
    }

    fn declare(
        &mut self,
        file: &FileDescriptorProto,
        google: bool,
        fqn: &str,
        flat: &str,
        kind: TypeKind,
    ) -> Result<(), Error> {
        let ty = TypeRef::new(file.package(), sanitize(flat));
        trace!(fqn, flat = %ty.name, "registered type");

        if !google {
            let key = (ty.package.clone(), ty.name.clone());
            if let Some(existing) = self.declared.get(&key) {
                return Err(Error::name_collision(
                    file.name(),
                    &ty.name,
                    format!("`{}` and `{}` flatten to the same name", existing, fqn),
                ));
            }
            self.declared.insert(key, fqn.to_string());
        }

        self.types.insert(
            fqn.to_string(),
            TypeInfo {
                file: file.name().to_string(),
                ty,
                kind,
                google,
            },
        );
        Ok(())
    }

    fn register_wrappers(&mut self, file: &'a FileDescriptorProto) -> Result<(), Error> {
        let scope = package_scope(file.package());
        for message in &file.message_type {
            self.register_message_wrappers(file, &scope, message)?;
        }
        Ok(())
    }

    fn register_message_wrappers(
        &mut self,
        file: &'a FileDescriptorProto,
        scope: &str,
        message: &'a DescriptorProto,
    ) -> Result<(), Error> {
        if message.is_map_entry() {
            return Ok(());
        }
        let fqn = format!("{}.{}", scope, message.name());

        for field in message.field.iter().filter(|f| f.is_repeated()) {
            let wrapper = match field.field_type() {
                Some(ty @ (Type::String | Type::Bytes)) => {
                    let name = list_wrapper_name(field.name());
                    let value = FieldDecl {
                        name: "value".to_string(),
                        ident: "value".to_string(),
                        number: 1,
                        kind: FieldKind::Scalar(ty),
                        repeated: false,
                    };
                    self.wrapper_decl(file.package(), name, vec![value])
                }
                Some(Type::Message) => {
                    let Some(entry) = self.map_entries.get(field.type_name()).copied() else {
                        continue;
                    };
                    let name = entry_wrapper_name(field.name());
                    let key = self.lower_field(file, &fqn, entry.key, "key".to_string())?;
                    let value = self.lower_field(file, &fqn, entry.value, "value".to_string())?;
                    self.wrapper_decl(file.package(), name, vec![key, value])
                }
                _ => continue,
            };
            self.register_wrapper(file, field, wrapper)?;
        }

        for nested in &message.nested_type {
            self.register_message_wrappers(file, &fqn, nested)?;
        }
        Ok(())
    }

    fn wrapper_decl(&self, package: &str, name: String, fields: Vec<FieldDecl>) -> MessageDecl {
        MessageDecl {
            fqn: format!("{}.{}", package_scope(package), name),
            ty: TypeRef::new(package, name),
            fields,
        }
    }

    fn register_wrapper(
        &mut self,
        file: &FileDescriptorProto,
        field: &FieldDescriptorProto,
        wrapper: MessageDecl,
    ) -> Result<(), Error> {
        let package = wrapper.ty.package.clone();
        let name = wrapper.ty.name.clone();

        if let Some(declared) = self.declared.get(&(package.clone(), name.clone())) {
            return Err(Error::name_collision(
                file.name(),
                &name,
                format!("wrapper for field `{}` collides with `{}`", field.name(), declared),
            ));
        }

        let wrappers = self.wrappers.entry(package).or_default();
        match wrappers.get(&name) {
            Some(existing) if *existing != wrapper => Err(Error::name_collision(
                file.name(),
                &name,
                format!(
                    "field `{}` needs a wrapper that differs from an earlier one of the same name",
                    field.name()
                ),
            )),
            Some(_) => Ok(()),
            None => {
                trace!(wrapper = %name, field = field.name(), "synthesized wrapper");
                wrappers.insert(name, wrapper);
                Ok(())
            }
        }
    }

    /// Resolve a message or enum reference of `field`.
    fn resolve(
        &self,
        file: &FileDescriptorProto,
        message: &str,
        field: &FieldDescriptorProto,
    ) -> Result<&TypeInfo, Error> {
        let type_name = field.type_name();
        let info = self.types.get(type_name).ok_or_else(|| {
            Error::invalid_field(
                file.name(),
                message,
                field.name(),
                format!("unresolved type `{}`", type_name),
            )
        })?;
        if info.google {
            return Err(Error::invalid_field(
                file.name(),
                message,
                field.name(),
                format!(
                    "`{}` is defined in {}, which has no Solidity counterpart",
                    type_name, info.file
                ),
            ));
        }
        Ok(info)
    }

    /// Lower one field. Repeated `string`/`bytes` and map fields become
    /// repeated references to their wrapper.
    fn lower_field(
        &self,
        file: &FileDescriptorProto,
        message: &str,
        field: &FieldDescriptorProto,
        ident: String,
    ) -> Result<FieldDecl, Error> {
        let invalid = |reason: &str| Error::invalid_field(file.name(), message, field.name(), reason);

        let ty = field.field_type().ok_or_else(|| invalid("unknown field type"))?;
        let number = field
            .number
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid("field number must be positive"))?;
        let repeated = field.is_repeated();

        let kind = match ty {
            Type::Group => return Err(invalid("groups are not supported")),
            Type::String | Type::Bytes if repeated => FieldKind::Message(TypeRef::new(
                file.package(),
                list_wrapper_name(field.name()),
            )),
            Type::Message if self.map_entries.contains_key(field.type_name()) => {
                FieldKind::Message(TypeRef::new(
                    file.package(),
                    entry_wrapper_name(field.name()),
                ))
            }
            Type::Message => {
                let info = self.resolve(file, message, field)?;
                if info.kind != TypeKind::Message {
                    return Err(invalid("message field references an enum"));
                }
                FieldKind::Message(info.ty.clone())
            }
            Type::Enum => {
                let info = self.resolve(file, message, field)?;
                let TypeKind::Enum { max, contiguous } = info.kind else {
                    return Err(invalid("enum field references a message"));
                };
                FieldKind::Enum(EnumRef {
                    ty: info.ty.clone(),
                    max,
                    contiguous,
                })
            }
            scalar => FieldKind::Scalar(scalar),
        };

        trace!(message, field = field.name(), ?kind, repeated, "lowered field");
        Ok(FieldDecl {
            name: field.name().to_string(),
            ident,
            number,
            kind,
            repeated,
        })
    }

    /// Lower a file into a unit. Only files passed as targets to
    /// [`Schema::build`] have their wrappers registered.
    pub fn lower(&self, file: &'a FileDescriptorProto) -> Result<Unit<'a>, Error> {
        debug!(file = file.name(), "lowering file");
        let mut unit = Unit {
            file,
            package: file.package().to_string(),
            decls: Vec::new(),
            wrappers: BTreeMap::new(),
            uses_float: false,
            uses_double: false,
        };

        let scope = package_scope(file.package());
        for enum_type in &file.enum_type {
            let decl = self.lower_enum(&scope, enum_type)?;
            unit.decls.push(Decl::Enum(decl));
        }
        for message in &file.message_type {
            self.lower_message(&mut unit, &scope, message)?;
        }
        Ok(unit)
    }

    fn lower_enum(&self, scope: &str, enum_type: &EnumDescriptorProto) -> Result<EnumDecl, Error> {
        let fqn = format!("{}.{}", scope, enum_type.name());
        let ty = self.registered(&fqn)?.ty.clone();
        let idents = unique_names(enum_type.value.iter().map(|v| v.name.as_deref().unwrap_or("")));
        let values = idents
            .into_iter()
            .zip(&enum_type.value)
            .map(|(ident, value)| (ident, value.number.unwrap_or(0)))
            .collect();
        Ok(EnumDecl { fqn, ty, values })
    }

    fn lower_message(
        &self,
        unit: &mut Unit<'a>,
        scope: &str,
        message: &'a DescriptorProto,
    ) -> Result<(), Error> {
        if message.is_map_entry() {
            return Ok(());
        }
        let fqn = format!("{}.{}", scope, message.name());

        for enum_type in &message.enum_type {
            let decl = self.lower_enum(&fqn, enum_type)?;
            unit.decls.push(Decl::Enum(decl));
        }
        for nested in &message.nested_type {
            self.lower_message(unit, &fqn, nested)?;
        }

        let ty = self.registered(&fqn)?.ty.clone();
        let idents = unique_names(message.field.iter().map(FieldDescriptorProto::name));
        let mut fields = Vec::with_capacity(message.field.len());
        for (field, ident) in message.field.iter().zip(idents) {
            let decl = self.lower_field(unit.file, &fqn, field, ident)?;
            if let FieldKind::Message(target) = &decl.kind {
                if let Some(wrapper) = self.wrapper(&target.package, &target.name) {
                    for inner in &wrapper.fields {
                        unit.note_field(inner);
                    }
                    unit.wrappers.insert(target.name.clone(), wrapper.clone());
                }
            }
            unit.note_field(&decl);
            fields.push(decl);
        }

        unit.decls.push(Decl::Message(MessageDecl { fqn, ty, fields }));
        Ok(())
    }

    fn registered(&self, fqn: &str) -> Result<&TypeInfo, Error> {
        self.types
            .get(fqn)
            .ok_or_else(|| Error::Descriptor(format!("type `{}` missing from registry", fqn)))
    }
}
