//! Decoded custom attribute values and the sources that supply them.

use std::fmt;

use crate::model::{CustomAttribute, MethodDef};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
  Bool(bool),
  Char(char),
  Int(i64),
  UInt(u64),
  Float(f64),
  /// `None` is the serialized null string.
  String(Option<String>),
  /// A `System.Type` argument, as its serialized name.
  Type(Option<String>),
  Enum { type_name: String, value: i64 },
  Array(Option<Vec<AttributeValue>>),
}

impl AttributeValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      AttributeValue::String(Some(text)) => Some(text),
      _ => None,
    }
  }

  /// Integer payload of enums and integers.
  pub fn as_integer(&self) -> Option<i64> {
    match self {
      AttributeValue::Enum { value, .. } | AttributeValue::Int(value) => Some(*value),
      AttributeValue::UInt(value) => i64::try_from(*value).ok(),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
  /// Field when true, property otherwise.
  pub is_field: bool,
  pub name: String,
  pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedAttribute {
  pub fixed: Vec<AttributeValue>,
  pub named: Vec<NamedArgument>,
}

impl DecodedAttribute {
  pub fn new(fixed: Vec<AttributeValue>) -> Self {
    Self { fixed, named: vec![] }
  }

  pub fn with_named(
    mut self,
    name: &str,
    value: AttributeValue,
  ) -> Self {
    self.named.push(NamedArgument {
      is_field: false,
      name: name.to_string(),
      value,
    });
    self
  }

  pub fn named(
    &self,
    name: &str,
  ) -> Option<&AttributeValue> {
    self.named.iter().find(|arg| arg.name == name).map(|arg| &arg.value)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  /// The listing carried no metadata token for the method.
  MissingToken,
  /// The loaded image has no method with this token.
  UnknownMethod(u32),
  /// No attribute on the method matches the constructor arity.
  NoMatchingAttribute { index: usize, arity: usize },
  UnsupportedValue(String),
}

impl fmt::Display for DecodeError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      DecodeError::MissingToken => write!(f, "listing has no metadata token for the method"),
      DecodeError::UnknownMethod(token) => write!(f, "no method with token 0x{:08X} in the image", token),
      DecodeError::NoMatchingAttribute { index, arity } => {
        write!(f, "attribute #{} with {} constructor arguments not found in the image", index, arity)
      },
      DecodeError::UnsupportedValue(kind) => write!(f, "unsupported attribute value {}", kind),
    }
  }
}

impl std::error::Error for DecodeError {}

/// Supplies the decoded value of a custom attribute found in a listing.
///
/// `index` is the attribute's position among the method's custom attributes.
pub trait AttributeSource {
  fn decode(
    &self,
    method: &MethodDef,
    index: usize,
    attribute: &CustomAttribute,
  ) -> Result<DecodedAttribute, DecodeError>;
}

impl<F> AttributeSource for F
where
  F: Fn(&MethodDef, usize, &CustomAttribute) -> Result<DecodedAttribute, DecodeError>,
{
  fn decode(
    &self,
    method: &MethodDef,
    index: usize,
    attribute: &CustomAttribute,
  ) -> Result<DecodedAttribute, DecodeError> {
    self(method, index, attribute)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_integer_payloads() {
    let mode = AttributeValue::Enum {
      type_name: "System.Runtime.InteropServices.CallingConvention".to_string(),
      value: 2,
    };
    assert_eq!(mode.as_integer(), Some(2));
    assert_eq!(AttributeValue::UInt(u64::MAX).as_integer(), None);
    assert_eq!(AttributeValue::String(None).as_str(), None);
  }

  #[test]
  fn test_named_lookup_prefers_exact_name() {
    let decoded = DecodedAttribute::new(vec![])
      .with_named("ExportName", AttributeValue::String(Some("WAT".to_string())))
      .with_named("CallingConvention", AttributeValue::Int(3));

    assert_eq!(decoded.named("ExportName").and_then(AttributeValue::as_str), Some("WAT"));
    assert_eq!(decoded.named("exportname"), None);
  }
}
