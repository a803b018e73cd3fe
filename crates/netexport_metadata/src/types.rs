//! Managed types as they appear in IL signatures.

use std::borrow::Cow;
use std::fmt;

/// Words the assembler reads as keywords. Identifiers spelled like one must be quoted.
const IL_KEYWORDS: &[&str] = &[
  "abstract", "add", "and", "ansi", "as", "assembly", "auto", "beforefieldinit", "bool", "box", "br", "call",
  "calli", "char", "class", "cil", "default", "div", "dup", "enum", "explicit", "extends", "extern", "field",
  "final", "float32", "float64", "hidebysig", "implements", "in", "instance", "int", "int16", "int32", "int64",
  "int8", "interface", "literal", "managed", "marshal", "method", "modopt", "modreq", "mul", "native", "neg",
  "nested", "newobj", "not", "object", "opt", "or", "out", "pinned", "pop", "private", "public", "rem", "ret",
  "sealed", "static", "string", "sub", "switch", "typedref", "uint16", "uint32", "uint64", "uint8", "unsigned",
  "valuetype", "value", "vararg", "virtual", "void", "xor",
];

fn is_id_start(c: char) -> bool {
  c.is_alphabetic() || matches!(c, '_' | '$' | '@' | '?' | '`')
}

fn is_id_char(c: char) -> bool {
  c.is_alphanumeric() || matches!(c, '_' | '$' | '@' | '?' | '`')
}

/// Whether `name` can be written in IL without quotes.
pub fn is_plain_identifier(name: &str) -> bool {
  if IL_KEYWORDS.contains(&name) {
    return false;
  }

  name.split('.').all(|segment| {
    let mut chars = segment.chars();
    match chars.next() {
      Some(first) => is_id_start(first) && chars.all(is_id_char),
      None => false,
    }
  })
}

/// Spell `name` as an IL identifier, single-quoting it when needed.
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
  if is_plain_identifier(name) {
    return Cow::Borrowed(name);
  }

  let mut quoted = String::with_capacity(name.len() + 2);
  quoted.push('\'');
  for c in name.chars() {
    if c == '\'' || c == '\\' {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('\'');
  Cow::Owned(quoted)
}

/// A reference to a named type, optionally resolved in another assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
  /// Resolution scope as written between brackets (`mscorlib`, `.module Other.dll`).
  pub scope: Option<String>,
  /// Full name with namespace; nested types are joined with `/`.
  pub name: String,
}

impl TypeRef {
  pub fn new(
    scope: Option<&str>,
    name: &str,
  ) -> Self {
    Self {
      scope: scope.map(str::to_string),
      name: name.to_string(),
    }
  }

  pub fn local(name: &str) -> Self {
    Self::new(None, name)
  }

  /// Type name without namespace or enclosing types.
  pub fn simple_name(&self) -> &str {
    let innermost = self.name.rsplit('/').next().unwrap_or(&self.name);
    innermost.rsplit('.').next().unwrap_or(innermost)
  }

  pub fn is_local(&self) -> bool {
    self.scope.is_none()
  }

  pub fn with_default_scope(
    &self,
    scope: &str,
  ) -> TypeRef {
    TypeRef {
      scope: Some(self.scope.clone().unwrap_or_else(|| scope.to_string())),
      name: self.name.clone(),
    }
  }
}

impl fmt::Display for TypeRef {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match &self.scope {
      Some(scope) if scope.starts_with(".module") => write!(f, "[{}]", scope)?,
      Some(scope) => write!(f, "[{}]", quote_identifier(scope))?,
      None => {},
    }

    for (i, part) in self.name.split('/').enumerate() {
      if i > 0 {
        write!(f, "/")?;
      }
      write!(f, "{}", quote_identifier(part))?;
    }

    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomModifier {
  /// `modreq` when true, `modopt` otherwise.
  pub required: bool,
  pub type_ref: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ManagedType {
  Void,
  Bool,
  Char,
  I8,
  U8,
  I16,
  U16,
  I32,
  U32,
  I64,
  U64,
  F32,
  F64,
  NativeInt,
  NativeUInt,
  String,
  Object,
  TypedRef,
  ValueType(TypeRef),
  Class(TypeRef),
  Pointer(Box<ManagedType>),
  ByRef(Box<ManagedType>),
  Array(Box<ManagedType>),
  Modified {
    inner: Box<ManagedType>,
    modifier: CustomModifier,
  },
  /// Generic parameters, instantiations and function pointers, kept as written.
  Opaque(String),
}

impl ManagedType {
  /// The type with all custom modifiers peeled off.
  pub fn unmodified(&self) -> &ManagedType {
    match self {
      ManagedType::Modified { inner, .. } => inner.unmodified(),
      other => other,
    }
  }

  pub fn is_void(&self) -> bool {
    matches!(self.unmodified(), ManagedType::Void)
  }

  /// Rewrites every unscoped type reference to resolve in `scope`.
  ///
  /// Used when a signature read from one module is written into another.
  pub fn requalify(
    &self,
    scope: &str,
  ) -> ManagedType {
    match self {
      ManagedType::ValueType(r) => ManagedType::ValueType(r.with_default_scope(scope)),
      ManagedType::Class(r) => ManagedType::Class(r.with_default_scope(scope)),
      ManagedType::Pointer(inner) => ManagedType::Pointer(Box::new(inner.requalify(scope))),
      ManagedType::ByRef(inner) => ManagedType::ByRef(Box::new(inner.requalify(scope))),
      ManagedType::Array(inner) => ManagedType::Array(Box::new(inner.requalify(scope))),
      ManagedType::Modified { inner, modifier } => ManagedType::Modified {
        inner: Box::new(inner.requalify(scope)),
        modifier: CustomModifier {
          required: modifier.required,
          type_ref: modifier.type_ref.with_default_scope(scope),
        },
      },
      other => other.clone(),
    }
  }
}

impl fmt::Display for ManagedType {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      ManagedType::Void => write!(f, "void"),
      ManagedType::Bool => write!(f, "bool"),
      ManagedType::Char => write!(f, "char"),
      ManagedType::I8 => write!(f, "int8"),
      ManagedType::U8 => write!(f, "unsigned int8"),
      ManagedType::I16 => write!(f, "int16"),
      ManagedType::U16 => write!(f, "unsigned int16"),
      ManagedType::I32 => write!(f, "int32"),
      ManagedType::U32 => write!(f, "unsigned int32"),
      ManagedType::I64 => write!(f, "int64"),
      ManagedType::U64 => write!(f, "unsigned int64"),
      ManagedType::F32 => write!(f, "float32"),
      ManagedType::F64 => write!(f, "float64"),
      ManagedType::NativeInt => write!(f, "native int"),
      ManagedType::NativeUInt => write!(f, "native unsigned int"),
      ManagedType::String => write!(f, "string"),
      ManagedType::Object => write!(f, "object"),
      ManagedType::TypedRef => write!(f, "typedref"),
      ManagedType::ValueType(r) => write!(f, "valuetype {}", r),
      ManagedType::Class(r) => write!(f, "class {}", r),
      ManagedType::Pointer(inner) => write!(f, "{}*", inner),
      ManagedType::ByRef(inner) => write!(f, "{}&", inner),
      ManagedType::Array(inner) => write!(f, "{}[]", inner),
      ManagedType::Modified { inner, modifier } => {
        let keyword = if modifier.required { "modreq" } else { "modopt" };
        write!(f, "{} {}({})", inner, keyword, modifier.type_ref)
      },
      ManagedType::Opaque(text) => write!(f, "{}", text),
    }
  }
}

/// The `marshal(...)` descriptor on a parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarshalHint(pub String);

impl MarshalHint {
  pub fn new(text: &str) -> Self {
    MarshalHint(text.trim().to_string())
  }

  /// `UnmanagedType.LPWStr`, a pointer to a UTF-16 string.
  pub fn is_wide_string(&self) -> bool {
    self.0.eq_ignore_ascii_case("lpwstr")
  }
}

impl fmt::Display for MarshalHint {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "marshal( {})", self.0)
  }
}
