use netexport_config::{ExportAttributeConfig, Platform, ToolOverrides};
use serde::Deserialize;

/// Contents of `netexport.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsToml {
  pub export: ExportAttributeConfig,
  pub tools: ToolOverrides,
  pub build: BuildSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
  pub platform: Option<Platform>,
  pub merge: Option<bool>,
  pub create_lib: Option<bool>,
}
