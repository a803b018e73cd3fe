use std::collections::HashMap;

use netexport_config::Platform;
use netexport_metadata::model::ParamDef;
use netexport_metadata::{CallingConvention, ManagedType, ModuleMetadata};

use crate::errors::SynthesisError;

/// First line of a module-definition file.
pub const EXPORTS_MARKER: &str = "EXPORTS";

/// Ordered export symbols, headed by [`EXPORTS_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportList {
  entries: Vec<String>,
  /// Symbol to the method that claimed it.
  owners: HashMap<String, String>,
}

impl Default for ExportList {
  fn default() -> Self {
    Self::new()
  }
}

impl ExportList {
  pub fn new() -> Self {
    Self {
      entries: vec![EXPORTS_MARKER.to_string()],
      owners: HashMap::new(),
    }
  }

  /// Appends `symbol`, rejecting one that an earlier method already claimed.
  pub fn push(
    &mut self,
    symbol: &str,
    owner: &str,
  ) -> Result<(), SynthesisError> {
    if let Some(first) = self.owners.get(symbol) {
      return Err(SynthesisError::DuplicateExport {
        symbol: symbol.to_string(),
        first: first.clone(),
        second: owner.to_string(),
      });
    }

    self.owners.insert(symbol.to_string(), owner.to_string());
    self.entries.push(symbol.to_string());
    Ok(())
  }

  /// The marker followed by every symbol in discovery order.
  pub fn entries(&self) -> &[String] {
    &self.entries
  }

  pub fn symbols(&self) -> &[String] {
    &self.entries[1..]
  }

  pub fn is_empty(&self) -> bool {
    self.entries.len() == 1
  }

  /// Text of the module-definition file, one entry per line.
  pub fn to_def(&self) -> String {
    let mut text = self.entries.join("\n");
    text.push('\n');
    text
  }
}

/// Symbol the linker sees for an export.
///
/// 32-bit stdcall symbols carry the argument stack size: `Name@8`.
pub fn export_symbol(
  name: &str,
  convention: CallingConvention,
  params: &[ParamDef],
  platform: Platform,
  module: &ModuleMetadata,
) -> String {
  if convention != CallingConvention::Stdcall || !platform.is_narrow() {
    return name.to_string();
  }

  let bytes: usize = params.iter().map(|param| stack_slot_size(&param.type_, module)).sum();
  format!("{}@{}", name, bytes)
}

/// Bytes a parameter occupies on the 32-bit stack.
fn stack_slot_size(
  ty: &ManagedType,
  module: &ModuleMetadata,
) -> usize {
  match ty.unmodified() {
    ManagedType::I64 | ManagedType::U64 | ManagedType::F64 => 8,
    ManagedType::ValueType(type_ref) => {
      let wide_enum = module
        .find_local_enum(type_ref)
        .and_then(|ty| ty.enum_underlying())
        .is_some_and(|underlying| matches!(underlying, ManagedType::I64 | ManagedType::U64));
      if wide_enum { 8 } else { 4 }
    },
    _ => 4,
  }
}
