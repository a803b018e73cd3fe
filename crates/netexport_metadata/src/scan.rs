//! Selection of exportable methods.

use std::fmt;

use netexport_config::ExportAttributeConfig;

use crate::attribute::{AttributeSource, AttributeValue, DecodeError};
use crate::model::{CustomAttribute, MethodDef, MethodSignature, ModuleMetadata, TypeDef};
use crate::types::ManagedType;

/// `System.Runtime.InteropServices.CallingConvention`, with `Winapi` folded into `Stdcall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
  Cdecl,
  Stdcall,
  ThisCall,
  FastCall,
}

impl CallingConvention {
  pub fn from_value(value: i64) -> Option<Self> {
    match value {
      1 | 3 => Some(CallingConvention::Stdcall),
      2 => Some(CallingConvention::Cdecl),
      4 => Some(CallingConvention::ThisCall),
      5 => Some(CallingConvention::FastCall),
      _ => None,
    }
  }

  /// Keyword placed before the symbol in a C declaration.
  pub fn keyword(self) -> &'static str {
    match self {
      CallingConvention::Cdecl => "__cdecl",
      CallingConvention::Stdcall => "__stdcall",
      CallingConvention::ThisCall => "__thiscall",
      CallingConvention::FastCall => "__fastcall",
    }
  }

  /// Modifier type in `System.Runtime.CompilerServices` that carries the convention in IL.
  pub fn marker_type(self) -> &'static str {
    match self {
      CallingConvention::Cdecl => "System.Runtime.CompilerServices.CallConvCdecl",
      CallingConvention::Stdcall => "System.Runtime.CompilerServices.CallConvStdcall",
      CallingConvention::ThisCall => "System.Runtime.CompilerServices.CallConvThiscall",
      CallingConvention::FastCall => "System.Runtime.CompilerServices.CallConvFastcall",
    }
  }
}

impl fmt::Display for CallingConvention {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let name = match self {
      CallingConvention::Cdecl => "Cdecl",
      CallingConvention::Stdcall => "StdCall",
      CallingConvention::ThisCall => "ThisCall",
      CallingConvention::FastCall => "FastCall",
    };
    write!(f, "{}", name)
  }
}

/// Decides whether a custom attribute tags its method for export.
pub trait ExportPredicate {
  fn is_export_attribute(
    &self,
    attribute: &CustomAttribute,
  ) -> bool;
}

impl<F> ExportPredicate for F
where
  F: Fn(&CustomAttribute) -> bool,
{
  fn is_export_attribute(
    &self,
    attribute: &CustomAttribute,
  ) -> bool {
    self(attribute)
  }
}

/// Matches attributes by simple type name, ignoring namespace and scope.
///
/// A configured `DllExportAttribute` also matches an attribute class named
/// `DllExport`, and the other way round.
#[derive(Debug, Clone)]
pub struct AttributeNamePredicate {
  names: Vec<String>,
}

impl AttributeNamePredicate {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  pub fn from_config(config: &ExportAttributeConfig) -> Self {
    Self::new(config.attributes.iter().cloned())
  }
}

impl ExportPredicate for AttributeNamePredicate {
  fn is_export_attribute(
    &self,
    attribute: &CustomAttribute,
  ) -> bool {
    let simple = attribute.simple_name();
    let bare = simple.strip_suffix("Attribute").unwrap_or(simple);

    self.names.iter().any(|name| {
      let wanted = name.strip_suffix("Attribute").unwrap_or(name);
      wanted == bare
    })
  }
}

/// A method selected for native export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportableMember<'m> {
  pub declaring_type: &'m TypeDef,
  pub method: &'m MethodDef,
  pub signature: &'m MethodSignature,
  pub exported_name: String,
  pub calling_convention: CallingConvention,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanWarningKind {
  UndecodableAttribute(DecodeError),
  MissingName,
  MissingConvention,
  InvalidConvention(i64),
  UnreadableSignature,
  GenericContext,
}

/// A tagged method that had to be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanWarning {
  pub type_name: String,
  pub method_name: String,
  pub kind: ScanWarningKind,
}

impl fmt::Display for ScanWarning {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "skipping {}::{}: ", self.type_name, self.method_name)?;

    match &self.kind {
      ScanWarningKind::UndecodableAttribute(err) => write!(f, "cannot read export attribute ({})", err),
      ScanWarningKind::MissingName => write!(f, "export attribute has no export name"),
      ScanWarningKind::MissingConvention => write!(f, "export attribute has no calling convention"),
      ScanWarningKind::InvalidConvention(value) => write!(f, "unsupported calling convention value {}", value),
      ScanWarningKind::UnreadableSignature => write!(f, "method signature could not be read"),
      ScanWarningKind::GenericContext => write!(f, "generic methods and methods of generic types cannot be exported"),
    }
  }
}

pub type ScanItem<'m> = Result<ExportableMember<'m>, ScanWarning>;

/// Lazily walks every public static method of every type and yields the tagged ones.
///
/// Untagged methods produce nothing. Each call walks the module again.
/// Attribute values come from `source`.
pub fn scan<'m, P, S>(
  module: &'m ModuleMetadata,
  predicate: &'m P,
  source: &'m S,
  values: &'m ExportAttributeConfig,
) -> impl Iterator<Item = ScanItem<'m>> + 'm
where
  P: ExportPredicate + ?Sized + 'm,
  S: AttributeSource + ?Sized + 'm,
{
  module.types.iter().flat_map(move |ty| {
    ty.methods
      .iter()
      .filter(|method| method.is_public_static())
      .filter_map(move |method| {
        let (index, attribute) = method
          .custom_attributes
          .iter()
          .enumerate()
          .find(|(_, attribute)| predicate.is_export_attribute(attribute))?;

        Some(read_member(source, ty, method, index, attribute, values))
      })
  })
}

fn read_member<'m, S>(
  source: &S,
  ty: &'m TypeDef,
  method: &'m MethodDef,
  index: usize,
  attribute: &CustomAttribute,
  values: &ExportAttributeConfig,
) -> ScanItem<'m>
where
  S: AttributeSource + ?Sized,
{
  let warn = |kind: ScanWarningKind| ScanWarning {
    type_name: ty.name.clone(),
    method_name: method.name.clone(),
    kind,
  };

  if ty.generic || method.generic {
    return Err(warn(ScanWarningKind::GenericContext));
  }

  let signature = method
    .signature
    .as_ref()
    .ok_or_else(|| warn(ScanWarningKind::UnreadableSignature))?;

  let decoded = source
    .decode(method, index, attribute)
    .map_err(|err| warn(ScanWarningKind::UndecodableAttribute(err)))?;

  let exported_name = decoded
    .named(&values.name_property)
    .and_then(AttributeValue::as_str)
    .or_else(|| decoded.fixed.iter().find_map(AttributeValue::as_str))
    .filter(|name| !name.is_empty())
    .ok_or_else(|| warn(ScanWarningKind::MissingName))?
    .to_string();

  let convention_value = decoded
    .named(&values.convention_property)
    .and_then(AttributeValue::as_integer)
    .or_else(|| {
      attribute
        .ctor_params
        .iter()
        .zip(&decoded.fixed)
        .find(|(param, _)| is_calling_convention(param))
        .and_then(|(_, value)| value.as_integer())
    })
    .ok_or_else(|| warn(ScanWarningKind::MissingConvention))?;

  let calling_convention = CallingConvention::from_value(convention_value)
    .ok_or_else(|| warn(ScanWarningKind::InvalidConvention(convention_value)))?;

  Ok(ExportableMember {
    declaring_type: ty,
    method,
    signature,
    exported_name,
    calling_convention,
  })
}

fn is_calling_convention(param: &ManagedType) -> bool {
  matches!(param.unmodified(), ManagedType::ValueType(type_ref) if type_ref.simple_name() == "CallingConvention")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::attribute::DecodedAttribute;
  use crate::parser::read_module;

  const LISTING: &str = r#"
.assembly extern mscorlib { .ver 4:0:0:0 }
.assembly Sample { .ver 1:0:0:0 }
.module Sample.dll

.class public auto ansi beforefieldinit Sample.Exports
       extends [mscorlib]System.Object
{
  .method public hidebysig static int32 Add(int32 a, int32 b) cil managed
  {
    .custom instance void Sample.DllExportAttribute::.ctor(string, valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( 01 00 03 41 64 64 02 00 00 00 00 00 )
    ret
  }

  .method public hidebysig static void Plain() cil managed
  {
    ret
  }

  .method private hidebysig static void Hidden() cil managed
  {
    .custom instance void Sample.DllExportAttribute::.ctor(string, valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( 01 00 06 48 69 64 64 65 6E 02 00 00 00 00 00 )
    ret
  }

  .method public hidebysig static void Nameless() cil managed
  {
    .custom instance void Sample.DllExportAttribute::.ctor(string, valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( 01 00 FF 03 00 00 00 00 00 )
    ret
  }

  .method public hidebysig static void Winapi() cil managed
  {
    .custom instance void DllExport::.ctor() = ( 01 00 02 00 54 0E 0A 45 78 70 6F 72 74 4E 61 6D 65 03 57 41 54 54 08 11 43 61 6C 6C 69 6E 67 43 6F 6E 76 65 6E 74 69 6F 6E 01 00 00 00 )
    ret
  }

  .method public hidebysig static void Odd() cil managed
  {
    .custom instance void Sample.DllExportAttribute::.ctor(string, valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( 01 00 01 58 09 00 00 00 00 00 )
    ret
  }
}

.class public auto ansi beforefieldinit Sample.Box`1<T>
       extends [mscorlib]System.Object
{
  .method public hidebysig static void Put() cil managed
  {
    .custom instance void Sample.DllExportAttribute::.ctor(string, valuetype [mscorlib]System.Runtime.InteropServices.CallingConvention) = ( 01 00 03 50 75 74 02 00 00 00 00 00 )
    ret
  }
}
"#;

  fn positional(
    name: Option<&str>,
    convention: i64,
  ) -> DecodedAttribute {
    DecodedAttribute::new(vec![
      AttributeValue::String(name.map(str::to_string)),
      AttributeValue::Enum {
        type_name: "System.Runtime.InteropServices.CallingConvention".to_string(),
        value: convention,
      },
    ])
  }

  /// Values the compiled module would hold for the attributes in `LISTING`.
  fn image_values(
    method: &MethodDef,
    index: usize,
    _attribute: &CustomAttribute,
  ) -> Result<DecodedAttribute, DecodeError> {
    assert_eq!(index, 0);

    match method.name.as_str() {
      "Add" => Ok(positional(Some("Add"), 2)),
      "Hidden" => Ok(positional(Some("Hidden"), 2)),
      "Nameless" => Ok(positional(None, 3)),
      "Winapi" => Ok(
        DecodedAttribute::new(vec![])
          .with_named("ExportName", AttributeValue::String(Some("WAT".to_string())))
          .with_named("CallingConvention", AttributeValue::Int(1)),
      ),
      "Odd" => Ok(positional(Some("X"), 9)),
      "Put" => Ok(positional(Some("Put"), 2)),
      _ => Err(DecodeError::MissingToken),
    }
  }

  fn results() -> Vec<Result<(String, CallingConvention), ScanWarningKind>> {
    let module = read_module(LISTING).unwrap();
    let predicate = AttributeNamePredicate::new(["DllExportAttribute"]);
    let values = ExportAttributeConfig::default();

    scan(&module, &predicate, &image_values, &values)
      .map(|item| {
        item
          .map(|member| (member.exported_name, member.calling_convention))
          .map_err(|warning| warning.kind)
      })
      .collect()
  }

  #[test]
  fn test_scan_yields_members_and_warnings_in_order() {
    let results = results();

    assert_eq!(
      results,
      vec![
        Ok(("Add".to_string(), CallingConvention::Cdecl)),
        Err(ScanWarningKind::MissingName),
        Ok(("WAT".to_string(), CallingConvention::Stdcall)),
        Err(ScanWarningKind::InvalidConvention(9)),
        Err(ScanWarningKind::GenericContext),
      ]
    );
  }

  #[test]
  fn test_closure_predicate() {
    let module = read_module(LISTING).unwrap();
    let values = ExportAttributeConfig::default();
    let only_short_names = |attribute: &CustomAttribute| attribute.simple_name() == "DllExport";

    let names: Vec<_> = scan(&module, &only_short_names, &image_values, &values)
      .filter_map(Result::ok)
      .map(|member| member.exported_name)
      .collect();

    assert_eq!(names, vec!["WAT"]);
  }

  #[test]
  fn test_scan_is_restartable() {
    let module = read_module(LISTING).unwrap();
    let predicate = AttributeNamePredicate::new(["DllExport"]);
    let values = ExportAttributeConfig::default();

    let first = scan(&module, &predicate, &image_values, &values).count();
    let second = scan(&module, &predicate, &image_values, &values).count();
    assert_eq!(first, 5);
    assert_eq!(first, second);
  }

  #[test]
  fn test_undecodable_attribute_is_a_warning() {
    let module = read_module(LISTING).unwrap();
    let predicate = AttributeNamePredicate::new(["DllExport"]);
    let values = ExportAttributeConfig::default();
    let unknown = |method: &MethodDef, _: usize, _: &CustomAttribute| -> Result<DecodedAttribute, DecodeError> {
      Err(DecodeError::UnknownMethod(method.token.unwrap_or(0x0600_0000)))
    };

    let first = scan(&module, &predicate, &unknown, &values).next().unwrap().unwrap_err();
    assert_eq!(first.kind, ScanWarningKind::UndecodableAttribute(DecodeError::UnknownMethod(0x0600_0000)));
    assert!(first.to_string().contains("cannot read export attribute"));
  }

  #[test]
  fn test_calling_convention_values() {
    assert_eq!(CallingConvention::from_value(1), Some(CallingConvention::Stdcall));
    assert_eq!(CallingConvention::from_value(3), Some(CallingConvention::Stdcall));
    assert_eq!(CallingConvention::from_value(5), Some(CallingConvention::FastCall));
    assert_eq!(CallingConvention::from_value(0), None);
    assert_eq!(CallingConvention::ThisCall.keyword(), "__thiscall");
  }

  #[test]
  fn test_warning_message_names_method() {
    let warning = ScanWarning {
      type_name: "Sample.Exports".to_string(),
      method_name: "Nameless".to_string(),
      kind: ScanWarningKind::MissingName,
    };
    assert_eq!(
      warning.to_string(),
      "skipping Sample.Exports::Nameless: export attribute has no export name"
    );
  }
}
