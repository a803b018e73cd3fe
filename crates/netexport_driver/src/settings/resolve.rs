use netexport_config::{ExporterConfig, Platform};

use crate::settings::config::SettingsToml;

/// Build options given on the command line. They override the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
  pub platform: Option<Platform>,
  pub merge: bool,
  pub create_lib: bool,
}

/// Folds file settings and command-line options into `config`.
pub fn apply_settings(
  config: &mut ExporterConfig,
  settings: Option<SettingsToml>,
  cli: &CliOverrides,
) {
  let settings = settings.unwrap_or_default();

  config.export = settings.export;
  config.tools = settings.tools;
  config.platform = cli.platform.or(settings.build.platform).unwrap_or_default();
  config.merge = cli.merge || settings.build.merge.unwrap_or(false);
  config.create_lib = cli.create_lib || settings.build.create_lib.unwrap_or(false);
}
