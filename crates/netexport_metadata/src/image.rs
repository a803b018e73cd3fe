//! Attribute values read straight from the compiled module.

use std::path::Path;
use std::sync::Arc;

use dotscope::CilObject;
use dotscope::metadata::customattributes::{CustomAttributeArgument, CustomAttributeValue};
use dotscope::metadata::token::Token;

use crate::attribute::{AttributeSource, AttributeValue, DecodeError, DecodedAttribute, NamedArgument};
use crate::errors::MetadataError;
use crate::model::{CustomAttribute, MethodDef};

/// A loaded .NET module. Listing methods are matched to it by metadata token.
pub struct ModuleImage {
  assembly: CilObject,
}

impl ModuleImage {
  pub fn load(path: &Path) -> Result<Self, MetadataError> {
    let assembly = CilObject::from_path(path).map_err(|err| MetadataError::Image {
      message: err.to_string(),
    })?;

    Ok(Self { assembly })
  }

  fn method_attributes(
    &self,
    token: u32,
  ) -> Result<Vec<Arc<CustomAttributeValue>>, DecodeError> {
    let entry = self
      .assembly
      .methods()
      .get(&Token::new(token))
      .ok_or(DecodeError::UnknownMethod(token))?;

    Ok(entry.value().custom_attributes.iter().map(|(_, value)| value.clone()).collect())
  }
}

impl AttributeSource for ModuleImage {
  fn decode(
    &self,
    method: &MethodDef,
    index: usize,
    attribute: &CustomAttribute,
  ) -> Result<DecodedAttribute, DecodeError> {
    let token = method.token.ok_or(DecodeError::MissingToken)?;
    let values = self.method_attributes(token)?;

    let arities: Vec<_> = values.iter().map(|value| value.fixed_args.len()).collect();
    let arity = attribute.ctor_params.len();
    let chosen = pick_attribute(&arities, index, arity).ok_or(DecodeError::NoMatchingAttribute { index, arity })?;

    let value = &values[chosen];
    let fixed = value.fixed_args.iter().map(convert).collect::<Result<_, _>>()?;
    let named = value
      .named_args
      .iter()
      .map(|arg| {
        Ok(NamedArgument {
          is_field: arg.is_field,
          name: arg.name.clone(),
          value: convert(&arg.value)?,
        })
      })
      .collect::<Result<_, DecodeError>>()?;

    Ok(DecodedAttribute { fixed, named })
  }
}

/// Position of the attribute to use.
///
/// The listing and the image normally agree on order. When the entry at `index`
/// has a different arity, the only entry with the wanted arity is used instead.
fn pick_attribute(
  arities: &[usize],
  index: usize,
  arity: usize,
) -> Option<usize> {
  if arities.get(index) == Some(&arity) {
    return Some(index);
  }

  let mut matching = arities.iter().enumerate().filter(|(_, candidate)| **candidate == arity);
  match (matching.next(), matching.next()) {
    (Some((position, _)), None) => Some(position),
    _ => None,
  }
}

fn convert(argument: &CustomAttributeArgument) -> Result<AttributeValue, DecodeError> {
  let value = match argument {
    CustomAttributeArgument::Bool(value) => AttributeValue::Bool(*value),
    CustomAttributeArgument::Char(value) => AttributeValue::Char(*value),
    CustomAttributeArgument::I1(value) => AttributeValue::Int(i64::from(*value)),
    CustomAttributeArgument::I2(value) => AttributeValue::Int(i64::from(*value)),
    CustomAttributeArgument::I4(value) => AttributeValue::Int(i64::from(*value)),
    CustomAttributeArgument::I8(value) => AttributeValue::Int(*value),
    CustomAttributeArgument::U1(value) => AttributeValue::UInt(u64::from(*value)),
    CustomAttributeArgument::U2(value) => AttributeValue::UInt(u64::from(*value)),
    CustomAttributeArgument::U4(value) => AttributeValue::UInt(u64::from(*value)),
    CustomAttributeArgument::U8(value) => AttributeValue::UInt(*value),
    CustomAttributeArgument::I(value) => AttributeValue::Int(*value as i64),
    CustomAttributeArgument::U(value) => AttributeValue::UInt(*value as u64),
    CustomAttributeArgument::R4(value) => AttributeValue::Float(f64::from(*value)),
    CustomAttributeArgument::R8(value) => AttributeValue::Float(*value),
    CustomAttributeArgument::String(text) => AttributeValue::String(Some(text.clone())),
    CustomAttributeArgument::Type(name) => AttributeValue::Type(Some(name.clone())),
    CustomAttributeArgument::Array(items) => {
      AttributeValue::Array(Some(items.iter().map(convert).collect::<Result<_, _>>()?))
    },
    CustomAttributeArgument::Enum(type_name, underlying) => {
      let value = convert(underlying)?
        .as_integer()
        .ok_or_else(|| DecodeError::UnsupportedValue(format!("for enum '{}'", type_name)))?;

      AttributeValue::Enum {
        type_name: type_name.clone(),
        value,
      }
    },
    CustomAttributeArgument::Void => return Err(DecodeError::UnsupportedValue("void".to_string())),
    #[allow(unreachable_patterns)]
    _ => return Err(DecodeError::UnsupportedValue("of an unrecognized kind".to_string())),
  };

  Ok(value)
}
