//! Functions for locating and loading netexport.toml.

use std::path::{Path, PathBuf};

use crate::settings::config::SettingsToml;
use crate::settings::errors::SettingsError;

/// The settings filename.
pub const SETTINGS_FILE: &str = "netexport.toml";

/// Search upward from `start` to find a directory containing netexport.toml.
///
/// `start` may be the input module itself; the search begins in its directory.
pub fn find_settings_root(start: &Path) -> Option<PathBuf> {
  let mut current = if start.is_file() {
    start.parent()?.to_path_buf()
  } else {
    start.to_path_buf()
  };

  loop {
    if current.join(SETTINGS_FILE).is_file() {
      return Some(current);
    }

    if !current.pop() {
      return None;
    }
  }
}

/// Load and parse a netexport.toml file.
pub fn load_settings(path: &Path) -> Result<SettingsToml, SettingsError> {
  let content = std::fs::read_to_string(path).map_err(|e| SettingsError::IoError {
    path: path.to_path_buf(),
    source: e,
  })?;

  toml::from_str(&content).map_err(|e| SettingsError::TomlParseError {
    path: path.to_path_buf(),
    message: e.to_string(),
  })
}

/// Settings that apply to `input`, with the file they came from.
pub fn settings_for(input: &Path) -> Result<Option<(PathBuf, SettingsToml)>, SettingsError> {
  let Some(root) = find_settings_root(input) else {
    return Ok(None);
  };

  let path = root.join(SETTINGS_FILE);
  let settings = load_settings(&path)?;
  Ok(Some((path, settings)))
}
