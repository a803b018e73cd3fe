use std::collections::HashMap;
use std::fmt::Write;

use netexport_metadata::model::TypeDef;
use netexport_metadata::{ManagedType, MarshalHint, ModuleMetadata};

/// Spelling used for strings without a wide-string marshal hint.
///
/// `char_t` is not a standard C type, so headers using it need a typedef
/// supplied by the consumer. Kept as is until the intended narrow type is known.
pub const NARROW_STRING: &str = "const char_t*";

pub const WIDE_STRING: &str = "const wchar_t*";

/// Maps managed types to C spellings and materializes enums as typedefs.
///
/// Each enum is materialized once, on first use; typedefs come out in that order.
pub struct TypeMapper<'m> {
  module: &'m ModuleMetadata,
  typedefs: Vec<String>,
  materialized: HashMap<String, String>,
}

impl<'m> TypeMapper<'m> {
  pub fn new(module: &'m ModuleMetadata) -> Self {
    Self {
      module,
      typedefs: Vec::new(),
      materialized: HashMap::new(),
    }
  }

  /// C spelling of `ty`. Never fails: unmappable types yield a marked placeholder.
  pub fn native_type(
    &mut self,
    ty: &ManagedType,
    hint: Option<&MarshalHint>,
  ) -> String {
    match ty.unmodified() {
      ManagedType::Void => "void".to_string(),
      ManagedType::Bool => "int".to_string(),
      ManagedType::Char => "wchar_t".to_string(),
      ManagedType::I8 => "__int8".to_string(),
      ManagedType::U8 => "unsigned __int8".to_string(),
      ManagedType::I16 => "__int16".to_string(),
      ManagedType::U16 => "unsigned __int16".to_string(),
      ManagedType::I32 => "__int32".to_string(),
      ManagedType::U32 => "unsigned __int32".to_string(),
      ManagedType::I64 => "__int64".to_string(),
      ManagedType::U64 => "unsigned __int64".to_string(),
      ManagedType::F32 => "float".to_string(),
      ManagedType::F64 => "double".to_string(),
      ManagedType::NativeInt | ManagedType::NativeUInt => "void*".to_string(),
      ManagedType::String => {
        if hint.is_some_and(MarshalHint::is_wide_string) {
          WIDE_STRING.to_string()
        } else {
          NARROW_STRING.to_string()
        }
      },
      ManagedType::Pointer(inner) | ManagedType::ByRef(inner) | ManagedType::Array(inner) => {
        format!("{}*", self.native_type(inner, None))
      },
      ManagedType::ValueType(type_ref) => match self.module.find_local_enum(type_ref) {
        Some(enum_type) => self.materialize_enum(enum_type),
        None => unknown(ty),
      },
      _ => unknown(ty),
    }
  }

  fn materialize_enum(
    &mut self,
    enum_type: &TypeDef,
  ) -> String {
    if let Some(name) = self.materialized.get(&enum_type.name) {
      return name.clone();
    }

    let name = enum_type.simple_name().to_string();
    let underlying = match enum_type.enum_underlying() {
      Some(ty) => self.native_type(ty, None),
      None => "__int32".to_string(),
    };

    let mut block = String::new();
    writeln!(block, "typedef enum {} : {}", name, underlying).unwrap();
    writeln!(block, "{{").unwrap();
    for (i, literal) in enum_type.enum_literals().iter().enumerate() {
      let separator = if i == 0 { "" } else { ", " };
      writeln!(block, "  {}{} = {}", separator, literal.name, literal.value).unwrap();
    }
    write!(block, "}} {};", name).unwrap();

    self.typedefs.push(block);
    self.materialized.insert(enum_type.name.clone(), name.clone());
    name
  }

  /// Typedef blocks in materialization order.
  pub fn typedefs(&self) -> &[String] {
    &self.typedefs
  }
}

fn unknown(ty: &ManagedType) -> String {
  format!("<unknown type: {}>", ty)
}
