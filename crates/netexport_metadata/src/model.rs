//! In-memory metadata of a disassembled module.

use crate::types::{ManagedType, MarshalHint, TypeRef};

/// Assembly name prefix of shim modules written by this tool.
pub const SHIM_PREFIX: &str = "NativeExports.";

/// Type that owns global fields and methods.
pub const GLOBAL_TYPE: &str = "<Module>";

/// Assemblies that can serve as the core library, in order of preference.
const CORE_LIBRARIES: &[&str] = &["mscorlib", "System.Runtime", "netstandard", "System.Private.CoreLib"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyDef {
  pub name: String,
  /// `.ver` as written, e.g. `1:0:0:0`.
  pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRef {
  pub name: String,
  /// Declarations between the braces, verbatim.
  pub body: String,
}

/// Constructor of a custom attribute together with its value blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttribute {
  pub attribute_type: TypeRef,
  pub ctor_params: Vec<ManagedType>,
  /// Raw value bytes; `None` when the listing used a form other than a hex blob.
  pub value: Option<Vec<u8>>,
}

impl CustomAttribute {
  pub fn simple_name(&self) -> &str {
    self.attribute_type.simple_name()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
  /// `in`, `out` and `opt` markers.
  pub flags: Vec<String>,
  pub type_: ManagedType,
  pub marshal: Option<MarshalHint>,
  pub name: Option<String>,
  /// Attributes attached through `.param [n]`.
  pub custom_attributes: Vec<CustomAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
  /// `instance` calling convention.
  pub instance: bool,
  pub return_type: ManagedType,
  pub return_marshal: Option<MarshalHint>,
  pub params: Vec<ParamDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
  pub name: String,
  /// `MethodDef` metadata token, present when the listing was written with `/TOKENS`.
  pub token: Option<u32>,
  pub flags: Vec<String>,
  /// Declares its own generic parameters.
  pub generic: bool,
  /// `None` when the header could not be read.
  pub signature: Option<MethodSignature>,
  pub custom_attributes: Vec<CustomAttribute>,
  /// Attributes attached to the return value through `.param [0]`.
  pub return_attributes: Vec<CustomAttribute>,
  /// Body carries an `.export` directive.
  pub exported: bool,
}

impl MethodDef {
  pub fn has_flag(
    &self,
    flag: &str,
  ) -> bool {
    self.flags.iter().any(|f| f == flag)
  }

  pub fn is_public_static(&self) -> bool {
    self.has_flag("public") && self.has_flag("static")
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLiteral {
  pub name: String,
  pub value: i128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
  pub name: String,
  pub flags: Vec<String>,
  pub type_: ManagedType,
  /// Value of a `literal` field.
  pub constant: Option<i128>,
}

impl FieldDef {
  pub fn has_flag(
    &self,
    flag: &str,
  ) -> bool {
    self.flags.iter().any(|f| f == flag)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeDef {
  /// Full name with namespace; nested types are joined with `/`.
  pub name: String,
  pub flags: Vec<String>,
  pub extends: Option<TypeRef>,
  pub generic: bool,
  pub methods: Vec<MethodDef>,
  pub fields: Vec<FieldDef>,
}

impl TypeDef {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Self::default()
    }
  }

  pub fn simple_name(&self) -> &str {
    let innermost = self.name.rsplit('/').next().unwrap_or(&self.name);
    innermost.rsplit('.').next().unwrap_or(innermost)
  }

  pub fn is_enum(&self) -> bool {
    self.extends.as_ref().is_some_and(|base| base.name == "System.Enum")
  }

  /// Underlying integer type of an enum, from its `value__` field.
  pub fn enum_underlying(&self) -> Option<&ManagedType> {
    if !self.is_enum() {
      return None;
    }

    self
      .fields
      .iter()
      .find(|field| field.name == "value__" && !field.has_flag("static"))
      .map(|field| &field.type_)
  }

  /// Enum members in declaration order.
  pub fn enum_literals(&self) -> Vec<EnumLiteral> {
    self
      .fields
      .iter()
      .filter(|field| field.has_flag("static") && field.has_flag("literal"))
      .filter_map(|field| {
        field.constant.map(|value| EnumLiteral {
          name: field.name.clone(),
          value,
        })
      })
      .collect()
  }

  /// Absorbs a second declaration of the same type.
  pub(crate) fn merge(
    &mut self,
    other: TypeDef,
  ) {
    if self.flags.is_empty() {
      self.flags = other.flags;
    }
    if self.extends.is_none() {
      self.extends = other.extends;
    }
    self.generic |= other.generic;
    self.methods.extend(other.methods);
    self.fields.extend(other.fields);
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMetadata {
  pub assembly: Option<AssemblyDef>,
  pub module_name: Option<String>,
  pub extern_assemblies: Vec<AssemblyRef>,
  pub types: Vec<TypeDef>,
}

impl ModuleMetadata {
  pub fn assembly_name(&self) -> Option<&str> {
    self.assembly.as_ref().map(|assembly| assembly.name.as_str())
  }

  pub fn find_type(
    &self,
    name: &str,
  ) -> Option<&TypeDef> {
    self.types.iter().find(|ty| ty.name == name)
  }

  /// Resolves a reference to an enum defined in this module.
  pub fn find_local_enum(
    &self,
    type_ref: &TypeRef,
  ) -> Option<&TypeDef> {
    if !type_ref.is_local() {
      return None;
    }

    self.find_type(&type_ref.name).filter(|ty| ty.is_enum())
  }

  /// Name of the referenced core library, used to scope well-known types.
  pub fn core_library(&self) -> &str {
    CORE_LIBRARIES
      .iter()
      .find(|core| self.extern_assemblies.iter().any(|r| r.name == **core))
      .copied()
      .unwrap_or(CORE_LIBRARIES[0])
  }

  /// Whether this tool already wrote exports into the module.
  pub fn is_processed(&self) -> bool {
    if self.assembly_name().is_some_and(|name| name.starts_with(SHIM_PREFIX)) {
      return true;
    }

    self.types.iter().flat_map(|ty| ty.methods.iter()).any(|method| method.exported)
  }

  /// Adds a type, merging it into an earlier declaration of the same name.
  pub(crate) fn add_type(
    &mut self,
    ty: TypeDef,
  ) {
    match self.types.iter_mut().find(|existing| existing.name == ty.name) {
      Some(existing) => existing.merge(ty),
      None => self.types.push(ty),
    }
  }
}
