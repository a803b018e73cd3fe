//! Errors that stop an export run.

use std::fmt;
use std::path::PathBuf;

use netexport_codegen::SynthesisError;
use netexport_metadata::MetadataError;

use crate::merge::MergeError;
use crate::settings::SettingsError;
use crate::toolchain::ToolchainError;

#[derive(Debug)]
pub enum ExportError {
  /// The input module does not exist.
  InputNotFound { path: PathBuf },

  /// Reading or writing a file failed.
  Io { path: PathBuf, source: std::io::Error },

  /// The disassembler could not turn the input into a listing.
  Load { path: PathBuf, source: ToolchainError },

  /// The disassembled module could not be read.
  Metadata { path: PathBuf, source: MetadataError },

  /// No method carries a usable export attribute.
  NoExports { path: PathBuf },

  Synthesis(SynthesisError),
  Merge(MergeError),
  Toolchain(ToolchainError),
  Settings(SettingsError),
}

impl fmt::Display for ExportError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      ExportError::InputNotFound { path } => {
        write!(f, "input module not found: '{}'", path.display())
      },

      ExportError::Io { path, source } => {
        write!(f, "cannot access '{}': {}", path.display(), source)
      },

      ExportError::Load { path, source } => {
        write!(f, "cannot disassemble '{}': {}", path.display(), source)
      },

      ExportError::Metadata { path, source } => {
        write!(f, "cannot load '{}': {}", path.display(), source)
      },

      ExportError::NoExports { path } => {
        write!(f, "no exportable members found in '{}'", path.display())
      },

      ExportError::Synthesis(err) => write!(f, "{}", err),
      ExportError::Merge(err) => write!(f, "{}", err),
      ExportError::Toolchain(err) => write!(f, "{}", err),
      ExportError::Settings(err) => write!(f, "{}", err),
    }
  }
}

impl std::error::Error for ExportError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ExportError::Io { source, .. } => Some(source),
      ExportError::Load { source, .. } => Some(source),
      ExportError::Metadata { source, .. } => Some(source),
      ExportError::Synthesis(err) => Some(err),
      ExportError::Merge(err) => Some(err),
      ExportError::Toolchain(err) => Some(err),
      ExportError::Settings(err) => Some(err),
      _ => None,
    }
  }
}

impl From<SynthesisError> for ExportError {
  fn from(err: SynthesisError) -> Self {
    ExportError::Synthesis(err)
  }
}

impl From<MergeError> for ExportError {
  fn from(err: MergeError) -> Self {
    ExportError::Merge(err)
  }
}

impl From<ToolchainError> for ExportError {
  fn from(err: ToolchainError) -> Self {
    ExportError::Toolchain(err)
  }
}

impl From<SettingsError> for ExportError {
  fn from(err: SettingsError) -> Self {
    ExportError::Settings(err)
  }
}

/// Attaches a path to an I/O failure.
pub(crate) trait IoContext<T> {
  fn at(
    self,
    path: &std::path::Path,
  ) -> Result<T, ExportError>;
}

impl<T> IoContext<T> for std::io::Result<T> {
  fn at(
    self,
    path: &std::path::Path,
  ) -> Result<T, ExportError> {
    self.map_err(|source| ExportError::Io {
      path: path.to_path_buf(),
      source,
    })
  }
}
