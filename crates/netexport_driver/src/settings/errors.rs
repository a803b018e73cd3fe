//! Error types for loading netexport.toml.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum SettingsError {
  /// I/O error while reading the settings file.
  IoError { path: PathBuf, source: std::io::Error },

  /// The file is not valid TOML or does not match the schema.
  TomlParseError { path: PathBuf, message: String },
}

impl fmt::Display for SettingsError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      SettingsError::IoError { path, source } => {
        write!(f, "failed to read '{}': {}", path.display(), source)
      },

      SettingsError::TomlParseError { path, message } => {
        write!(f, "failed to parse '{}': {}", path.display(), message)
      },
    }
  }
}

impl std::error::Error for SettingsError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      SettingsError::IoError { source, .. } => Some(source),
      _ => None,
    }
  }
}
