use std::fmt::Write;

use netexport_metadata::model::MethodSignature;
use netexport_metadata::CallingConvention;

use crate::type_map::TypeMapper;

/// Accumulates the native header: a preamble, then one declaration per export.
///
/// Enum typedefs are only known once every export has been mapped, so they are
/// placed between the preamble and the declarations when the header is finished.
#[derive(Debug, Clone)]
pub struct HeaderBuffer {
  preamble: String,
  declarations: Vec<String>,
}

impl HeaderBuffer {
  pub fn new(assembly: &str) -> Self {
    let mut preamble = String::new();
    writeln!(preamble, "// Native exports of {}. Generated by netexport, do not edit.", assembly).unwrap();
    writeln!(preamble, "#pragma once").unwrap();
    writeln!(preamble).unwrap();
    writeln!(preamble, "#include <wchar.h>").unwrap();
    writeln!(preamble).unwrap();
    writeln!(preamble, "#ifdef __cplusplus").unwrap();
    writeln!(preamble, "extern \"C\" {{").unwrap();
    writeln!(preamble, "#endif").unwrap();
    writeln!(preamble).unwrap();

    Self {
      preamble,
      declarations: Vec::new(),
    }
  }

  pub fn push(
    &mut self,
    declaration: String,
  ) {
    self.declarations.push(declaration);
  }

  pub fn finish(
    self,
    typedefs: &[String],
  ) -> String {
    let mut output = self.preamble;

    for typedef in typedefs {
      writeln!(output, "{}", typedef).unwrap();
      writeln!(output).unwrap();
    }

    for declaration in &self.declarations {
      writeln!(output, "{}", declaration).unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "#ifdef __cplusplus").unwrap();
    writeln!(output, "}}").unwrap();
    writeln!(output, "#endif").unwrap();
    output
  }
}

/// `ret convention name(type param, ...);`
///
/// The convention keyword follows the return type, which is where C compilers
/// accept it in a declaration.
pub fn declaration(
  mapper: &mut TypeMapper<'_>,
  name: &str,
  convention: CallingConvention,
  signature: &MethodSignature,
) -> String {
  let return_type = mapper.native_type(&signature.return_type, signature.return_marshal.as_ref());

  let params: Vec<_> = signature
    .params
    .iter()
    .enumerate()
    .map(|(i, param)| {
      let ty = mapper.native_type(&param.type_, param.marshal.as_ref());
      match &param.name {
        Some(name) => format!("{} {}", ty, name),
        None => format!("{} arg{}", ty, i),
      }
    })
    .collect();

  let params_str = if params.is_empty() {
    "void".to_string()
  } else {
    params.join(", ")
  };

  format!("{} {} {}({});", return_type, convention.keyword(), name, params_str)
}
