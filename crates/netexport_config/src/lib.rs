use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Target architecture of the produced module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  #[default]
  X86,
  X64,
}

impl Platform {
  /// The 32-bit target. Stdcall symbols get a stack-size suffix only here.
  pub fn is_narrow(self) -> bool {
    matches!(self, Platform::X86)
  }

  /// Value for the librarian's `/MACHINE:` switch.
  pub fn machine(self) -> &'static str {
    match self {
      Platform::X86 => "X86",
      Platform::X64 => "X64",
    }
  }
}

impl std::fmt::Display for Platform {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    match self {
      Platform::X86 => write!(f, "x86"),
      Platform::X64 => write!(f, "x64"),
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugTrace {
  Scan,
  Types,
  Synth,
  Merge,
  Tools,
}

/// Which custom attributes tag a method for export and how their values are read.
///
/// Matching is by the attribute type's simple name, so consumers can declare
/// their own attribute class in any namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportAttributeConfig {
  /// Simple names of attribute types that mark a method for export.
  pub attributes: Vec<String>,
  /// Property holding the exported symbol name.
  pub name_property: String,
  /// Property holding the `CallingConvention` value.
  pub convention_property: String,
}

impl Default for ExportAttributeConfig {
  fn default() -> Self {
    Self {
      attributes: vec!["DllExportAttribute".to_string()],
      name_property: "ExportName".to_string(),
      convention_property: "CallingConvention".to_string(),
    }
  }
}

/// Explicit tool locations, taking precedence over any lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOverrides {
  pub ildasm: Option<PathBuf>,
  pub ilasm: Option<PathBuf>,
  pub lib: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ExporterConfig {
  /// The managed module to process.
  pub input: PathBuf,
  /// Explicit output path (`--output-filename`).
  pub output: Option<PathBuf>,
  /// Merge the exports into the original module instead of producing a separate shim.
  pub merge: bool,
  pub keep_temp_files: bool,
  /// Ignore the cached tool locations and search again.
  pub rescan_tools: bool,
  /// Produce a `.def` file and an import library next to the output.
  pub create_lib: bool,
  /// Write a native header to this path.
  pub create_header: Option<PathBuf>,
  pub platform: Platform,
  /// Emit debug symbols and verbose diagnostics.
  pub debug: bool,
  pub debug_trace: Vec<DebugTrace>,
  pub quiet: bool,
  pub verbose: u8,
  pub export: ExportAttributeConfig,
  pub tools: ToolOverrides,
}

impl ExporterConfig {
  pub fn new_basic(
    input: PathBuf,
    debug: bool,
    debug_trace: Vec<DebugTrace>,
    quiet: bool,
    verbose: u8,
  ) -> Self {
    Self {
      input,
      debug,
      debug_trace,
      quiet,
      verbose,
      ..Self::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_platform_narrowness() {
    assert!(Platform::X86.is_narrow());
    assert!(!Platform::X64.is_narrow());
    assert_eq!(Platform::default(), Platform::X86);
  }

  #[test]
  fn test_platform_machine_and_display() {
    assert_eq!(Platform::X86.machine(), "X86");
    assert_eq!(Platform::X64.machine(), "X64");
    assert_eq!(Platform::X64.to_string(), "x64");
  }

  #[test]
  fn test_default_export_attribute_config() {
    let config = ExportAttributeConfig::default();
    assert_eq!(config.attributes, vec!["DllExportAttribute"]);
    assert_eq!(config.name_property, "ExportName");
    assert_eq!(config.convention_property, "CallingConvention");
  }

  #[test]
  fn test_new_basic_keeps_logging_flags() {
    let config = ExporterConfig::new_basic(PathBuf::from("a.dll"), true, vec![DebugTrace::Merge], false, 1);
    assert!(config.debug);
    assert_eq!(config.debug_trace, vec![DebugTrace::Merge]);
    assert_eq!(config.verbose, 1);
    assert!(!config.merge);
  }
}
