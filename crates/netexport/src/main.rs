mod cli;
mod samples;

use clap::{CommandFactory, Parser};
use colored::*;
use netexport_config::ExporterConfig;
use netexport_driver::settings::{CliOverrides, apply_settings, settings_for};
use netexport_driver::ExportError;
use netexport_log::log_dbg;

use cli::Cli;

fn print_logo() {
  eprintln!(
    "{} {} - native exports for .NET assemblies",
    "netexport".bright_cyan().bold(),
    env!("CARGO_PKG_VERSION")
  );
}

fn parse_cli_to_config(
  cli: &Cli,
  input: &std::path::Path,
) -> Result<ExporterConfig, ExportError> {
  let mut config = ExporterConfig::new_basic(
    input.to_path_buf(),
    cli.debug,
    cli.debug_trace.iter().copied().map(Into::into).collect(),
    cli.quiet,
    cli.verbose,
  );

  config.output = cli.output_filename.clone();
  config.keep_temp_files = cli.keep_temp_files;
  config.rescan_tools = cli.rescan_tools;
  config.create_header = cli.create_header.clone();

  let settings = match settings_for(input)? {
    Some((path, settings)) => {
      log_dbg!(&config, "using settings from {}", path.display());
      Some(settings)
    },
    None => None,
  };

  let overrides = CliOverrides {
    platform: cli.platform.map(Into::into),
    merge: cli.merge,
    create_lib: cli.create_lib,
  };
  apply_settings(&mut config, settings, &overrides);

  Ok(config)
}

fn fail(err: &ExportError) -> ! {
  eprintln!("{} {}", "Error:".red().bold(), err);
  std::process::exit(1);
}

fn main() {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(err) => {
      let _ = err.print();
      std::process::exit(cli::exit_code_for(&err));
    },
  };

  if !cli.nologo && !cli.quiet {
    print_logo();
  }

  if cli.sample_usage || cli.sample_class {
    if cli.sample_usage {
      print!("{}", samples::SAMPLE_USAGE);
    }
    if cli.sample_class {
      print!("{}", samples::SAMPLE_CLASS);
    }
    return;
  }

  let [input] = cli.inputs.as_slice() else {
    let _ = Cli::command().print_help();
    return;
  };

  let config = match parse_cli_to_config(&cli, input) {
    Ok(config) => config,
    Err(err) => fail(&err),
  };

  if let Err(err) = netexport_driver::run(&config) {
    fail(&err);
  }
}
